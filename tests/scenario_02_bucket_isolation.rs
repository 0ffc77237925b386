//! End-to-end scenario: a bucket filter must hide molecules from other
//! buckets even when they share keywords.

mod common;

use common::open_core;
use star_core::model::{MoleculeType, Provenance};
use star_core::QueryOptions;
use tempfile::tempdir;

#[tokio::test]
async fn bucket_filter_excludes_other_buckets() {
    let dir = tempdir().unwrap();
    let star = open_core(dir.path());

    star.ingest(
        "Personal budget planning for the household this quarter",
        "personal-budget.md",
        MoleculeType::Prose,
        ["personal".to_string()],
        [],
        Provenance::Internal,
    )
    .unwrap();

    star.ingest(
        "Work budget planning for the engineering team this quarter",
        "work-budget.md",
        MoleculeType::Prose,
        ["work".to_string()],
        [],
        Provenance::Internal,
    )
    .unwrap();

    let options = QueryOptions {
        buckets: Some(vec!["personal".to_string()]),
        ..QueryOptions::default()
    };
    let response = star.search("budget", options).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert!(response.context.contains("Personal budget"));
    assert!(!response.context.contains("engineering team"));
}
