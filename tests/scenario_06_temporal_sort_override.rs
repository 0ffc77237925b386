//! End-to-end scenario: a query with a temporal marker ("earliest") sorts
//! results ascending by timestamp, overriding gravity order.

mod common;

use chrono::Duration;
use common::open_core;
use star_core::model::{AtomId, MoleculeType, Provenance};
use star_core::QueryOptions;
use tempfile::tempdir;

#[tokio::test]
async fn earliest_marker_sorts_ascending_by_timestamp() {
    let dir = tempdir().unwrap();
    let star = open_core(dir.path());
    let now = chrono::Utc::now();

    star.ingest_with_timestamp(
        "Expedition log about the glacier retreat, third entry",
        "glacier-3.md",
        MoleculeType::Prose,
        [],
        [AtomId::new("glacier")],
        Provenance::Internal,
        now,
    )
    .unwrap();
    star.ingest_with_timestamp(
        "Expedition log about the glacier retreat, first entry ever written",
        "glacier-1.md",
        MoleculeType::Prose,
        [],
        [AtomId::new("glacier")],
        Provenance::Internal,
        now - Duration::days(30),
    )
    .unwrap();
    star.ingest_with_timestamp(
        "Expedition log about the glacier retreat, second entry",
        "glacier-2.md",
        MoleculeType::Prose,
        [],
        [AtomId::new("glacier")],
        Provenance::Internal,
        now - Duration::days(15),
    )
    .unwrap();

    let response = star.search("earliest note about glacier", QueryOptions::default()).await.unwrap();

    assert!(response.results.len() >= 2);
    // Molecules are appended to the context in result order, so the oldest
    // entry's text must appear before the newer ones once ascending sort fires.
    let first_pos = response.context.find("first entry ever written").expect("oldest entry missing from context");
    let third_pos = response.context.find("third entry").expect("newest entry missing from context");
    assert!(first_pos < third_pos, "expected oldest entry to rank before the newest");
}
