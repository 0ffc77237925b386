//! End-to-end scenario: the tag-walker reaches a compound that shares no
//! keyword with the query, only a chain of co-occurring tags.

mod common;

use common::open_core_with;
use star_core::config::RecallMode;
use star_core::model::{AtomId, MoleculeType, Provenance};
use star_core::search::Class;
use star_core::QueryOptions;
use tempfile::tempdir;

#[tokio::test]
async fn walker_reaches_third_compound_via_two_hops() {
    let dir = tempdir().unwrap();
    let star = open_core_with(dir.path(), |c| c.recall_mode = RecallMode::Focused);

    // adhd <-> diagnosis co-occur here.
    star.ingest(
        "Notes on adhd and its diagnosis process, written for a followup visit",
        "adhd-diagnosis.md",
        MoleculeType::Prose,
        [],
        [AtomId::new("adhd"), AtomId::new("diagnosis")],
        Provenance::Internal,
    )
    .unwrap();

    // diagnosis <-> july 2025 event co-occur here.
    star.ingest(
        "Followup on the diagnosis that came up again at the july 2025 event",
        "followup-event.md",
        MoleculeType::Prose,
        [],
        [AtomId::new("diagnosis"), AtomId::new("july 2025 event")],
        Provenance::Internal,
    )
    .unwrap();

    // Only reachable through the july 2025 event tag, two hops from adhd.
    star.ingest(
        "Planning notes for logistics around the july 2025 event itself",
        "event-logistics.md",
        MoleculeType::Prose,
        [],
        [AtomId::new("july 2025 event")],
        Provenance::Internal,
    )
    .unwrap();

    let response = star.search("adhd", QueryOptions::default()).await.unwrap();

    assert_eq!(response.results.len(), 3, "expected all three compounds to surface: {:?}", response.results);
    assert!(
        response.results.iter().any(|r| r.class == Class::Moon),
        "expected at least one walker-sourced moon result"
    );
}
