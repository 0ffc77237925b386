//! Molecule: a byte-range within a compound — the unit of retrieval and ranking.

use super::ids::{AtomId, CompoundId, MoleculeId};
use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Atomizer strategy that produced a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoleculeType {
    Prose,
    Code,
    Data,
    /// A molecule that didn't cleanly fit a strategy's boundaries (e.g. a
    /// malformed data block demoted to prose per spec §4.3).
    Fragment,
}

/// Trust/handling class for a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Internal,
    External,
    Quarantine,
}

/// A byte-range within a compound, plus derived data (tags, simhash,
/// embedding) used at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Molecule {
    pub id: MoleculeId,
    pub compound_id: CompoundId,
    pub sequence: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub molecule_type: MoleculeType,
    pub simhash: Fingerprint,
    pub embedding: Vec<f32>,
    /// Whether `embedding` is a real vector or a zero-vector placeholder
    /// left by a failed embed call (spec §4.5 / §9 open question).
    pub embedding_pending: bool,
    pub timestamp: DateTime<Utc>,
    pub buckets: BTreeSet<String>,
    pub epochs: BTreeSet<String>,
    pub tags: BTreeSet<AtomId>,
    pub provenance: Provenance,
}

impl Molecule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        compound_id: CompoundId,
        sequence: u32,
        start_byte: usize,
        end_byte: usize,
        molecule_type: MoleculeType,
        simhash: Fingerprint,
        embedding_dim: usize,
    ) -> Self {
        Self {
            id: MoleculeId::new(),
            compound_id,
            sequence,
            start_byte,
            end_byte,
            molecule_type,
            simhash,
            embedding: vec![0.0; embedding_dim],
            embedding_pending: true,
            timestamp: Utc::now(),
            buckets: BTreeSet::new(),
            epochs: BTreeSet::new(),
            tags: BTreeSet::new(),
            provenance: Provenance::Internal,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn in_bucket(&self, bucket: &str) -> bool {
        self.buckets.is_empty() || self.buckets.contains(bucket)
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding_pending = false;
        self.embedding = embedding;
        self
    }

    pub fn with_buckets(mut self, buckets: impl IntoIterator<Item = String>) -> Self {
        self.buckets = buckets.into_iter().collect();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = AtomId>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }
}
