//! End-to-end scenario: ingest a single compound and recall it by an exact
//! keyword match.

mod common;

use common::open_core;
use star_core::model::{MoleculeType, Provenance};
use star_core::QueryOptions;
use tempfile::tempdir;

#[tokio::test]
async fn ingest_then_exact_keyword_recall() {
    let dir = tempdir().unwrap();
    let star = open_core(dir.path());

    star.ingest(
        "Project Chronos explores infinite context",
        "chronos.md",
        MoleculeType::Prose,
        [],
        [],
        Provenance::Internal,
    )
    .unwrap();

    let response = star.search("Chronos", QueryOptions::default()).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].gravity > 0.0, "gravity was {}", response.results[0].gravity);
    assert!(response.context.contains("Project Chronos"));
}
