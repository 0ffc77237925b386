//! Atom: a tag/concept node in the co-occurrence graph the tag-walker traverses.

use super::ids::AtomId;
use serde::{Deserialize, Serialize};

/// A tag as it exists in the graph, independent of any one molecule.
/// `occurrence_count` backs the synonym ring's frequency-based ranking and
/// the tag-walker's damping (spec §4.4, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    pub id: AtomId,
    pub occurrence_count: u64,
}

impl Atom {
    pub fn new(id: AtomId) -> Self {
        Self {
            id,
            occurrence_count: 0,
        }
    }

    pub fn record_occurrence(&mut self) {
        self.occurrence_count += 1;
    }
}
