//! End-to-end scenario: two compounds with identical content collapse to a
//! single result after simhash-based deduplication.

mod common;

use common::open_core;
use star_core::model::{MoleculeType, Provenance};
use star_core::QueryOptions;
use tempfile::tempdir;

#[tokio::test]
async fn identical_content_deduplicates_to_one_result() {
    let dir = tempdir().unwrap();
    let star = open_core(dir.path());

    let content = "The archipelago survey found seventeen distinct tide pools worth revisiting";

    star.ingest(content, "survey-a.md", MoleculeType::Prose, [], [], Provenance::Internal).unwrap();
    star.ingest(content, "survey-b.md", MoleculeType::Prose, [], [], Provenance::Internal).unwrap();

    let response = star.search("archipelago", QueryOptions::default()).await.unwrap();

    assert_eq!(response.results.len(), 1, "expected near-duplicates to collapse: {:?}", response.results);
}
