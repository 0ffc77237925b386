//! Index store trait: the persistent-state contract every search component
//! depends on, independent of backend.

use crate::error::StarResult;
use crate::model::{Atom, AtomId, Compound, CompoundId, Edge, Molecule, MoleculeId, Provenance};

/// Filter criteria shared by FTS and ANN search (spec §4.9's "bucket
/// filters MUST be enforced at both FTS and vector stages").
#[derive(Debug, Clone, Default)]
pub struct MoleculeFilter {
    pub buckets: Option<Vec<String>>,
    pub tags: Option<Vec<AtomId>>,
    pub provenance: Option<Provenance>,
}

impl MoleculeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buckets(mut self, buckets: Vec<String>) -> Self {
        self.buckets = Some(buckets);
        self
    }

    pub fn with_tags(mut self, tags: Vec<AtomId>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn matches(&self, molecule: &Molecule) -> bool {
        if let Some(buckets) = &self.buckets {
            if !buckets.iter().any(|b| molecule.in_bucket(b)) {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().any(|t| molecule.tags.contains(t)) {
                return false;
            }
        }
        if let Some(provenance) = &self.provenance {
            if molecule.provenance != *provenance {
                return false;
            }
        } else if molecule.provenance == Provenance::Quarantine {
            // Quarantined molecules are invisible unless explicitly asked for.
            return false;
        }
        true
    }
}

/// Persistent store: point access, full-text search, approximate-nearest-
/// neighbor search, and tag-graph access over compounds/molecules/atoms.
///
/// Invariants implementations must uphold: reads never observe a partial
/// write of a molecule; secondary-index maintenance (FTS row, tag
/// frequency) happens in the same transaction as the primary row write.
pub trait IndexStore: Send + Sync {
    fn upsert_compound(&self, compound: &Compound) -> StarResult<()>;
    fn get_compound(&self, id: &CompoundId) -> StarResult<Option<Compound>>;
    fn delete_compound(&self, id: &CompoundId) -> StarResult<bool>;
    fn all_compounds(&self) -> StarResult<Vec<Compound>>;

    /// Upsert a molecule along with the sanitized text it was derived from
    /// — the text is what gets indexed into the FTS table, not stored
    /// again in the molecules row (the mirror is the source of truth).
    fn upsert_molecule(&self, molecule: &Molecule, text: &str) -> StarResult<()>;
    fn get_molecule(&self, id: &MoleculeId) -> StarResult<Option<Molecule>>;
    fn delete_molecule(&self, id: &MoleculeId) -> StarResult<bool>;
    fn molecules_for_compound(&self, id: &CompoundId) -> StarResult<Vec<Molecule>>;

    /// Lexical search: ranked `(molecule_id, fts_score)` pairs, bucket/tag/
    /// provenance filters applied in the SQL predicate itself.
    fn fts_search(
        &self,
        keywords: &[String],
        filter: &MoleculeFilter,
        limit: usize,
    ) -> StarResult<Vec<(MoleculeId, f32)>>;

    /// Molecules tagged with any of `tags`, best-effort capped at `limit` —
    /// backs the tag-walker's moon-candidate lookup (spec §4.10).
    fn molecules_by_tags(&self, tags: &[AtomId], limit: usize) -> StarResult<Vec<Molecule>>;

    fn upsert_edge(&self, edge: &Edge) -> StarResult<()>;
    fn edges_for_atom(&self, atom: &AtomId) -> StarResult<Vec<Edge>>;
    fn all_edges(&self) -> StarResult<Vec<Edge>>;

    fn upsert_atom(&self, atom: &Atom) -> StarResult<()>;
    fn get_atom(&self, id: &AtomId) -> StarResult<Option<Atom>>;
    fn tag_frequency(&self, atom: &AtomId) -> StarResult<u64>;

    fn list_buckets(&self) -> StarResult<Vec<String>>;
    fn list_tags(&self, buckets: Option<&[String]>) -> StarResult<Vec<AtomId>>;

    fn total_molecules(&self) -> StarResult<u64>;
}

/// Approximate-nearest-neighbor search, kept as a separate trait from
/// `IndexStore` because a deployment without the `embeddings` feature
/// (or with a stale/missing ANN index) has no implementation at all —
/// callers treat `None` as "degrade to full-scan cosine similarity",
/// not as an error.
pub trait VectorIndex: Send + Sync {
    fn upsert_vector(&self, molecule_id: &MoleculeId, embedding: &[f32]) -> StarResult<()>;
    fn delete_vector(&self, molecule_id: &MoleculeId) -> StarResult<()>;
    fn ann_search(&self, query: &[f32], limit: usize) -> StarResult<Vec<(MoleculeId, f32)>>;
}
