//! Synonym ring: a read-mostly, startup-rebuilt expansion table from tag
//! co-occurrence plus lexical variants (spec §4.8).

use crate::model::{AtomId, Edge};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Minimum shared-prefix length for two terms to be considered lexical
/// variants of each other (e.g. "diagnose"/"diagnosis").
const LEXICAL_PREFIX_MIN: usize = 5;
const LEXICAL_LEN_DIFF_MAX: usize = 3;
/// Attenuation applied to a lexical-variant synonym relative to a
/// co-occurrence-derived one, which instead carries its normalized edge weight.
const LEXICAL_WEIGHT: f32 = 0.4;

#[derive(Debug, Clone, Default)]
pub struct SynonymRing {
    rings: BTreeMap<AtomId, Vec<(AtomId, f32)>>,
}

impl SynonymRing {
    /// Build a ring for every term in `known_terms`: up to `max_ring_size`
    /// synonyms drawn from co-occurrence neighbors (weight-sorted) and
    /// lexical variants, merged and re-sorted by weight.
    pub fn build(edges: &[Edge], known_terms: &[AtomId], max_ring_size: usize) -> Self {
        let max_weight = edges.iter().map(|e| e.weight).max().unwrap_or(1).max(1) as f32;
        let mut rings: BTreeMap<AtomId, Vec<(AtomId, f32)>> = BTreeMap::new();

        for edge in edges {
            let w = edge.weight as f32 / max_weight;
            rings.entry(edge.atom_a.clone()).or_default().push((edge.atom_b.clone(), w));
            rings.entry(edge.atom_b.clone()).or_default().push((edge.atom_a.clone(), w));
        }

        for term in known_terms {
            for other in known_terms {
                if term == other {
                    continue;
                }
                if is_lexical_variant(term.as_str(), other.as_str()) {
                    rings.entry(term.clone()).or_default().push((other.clone(), LEXICAL_WEIGHT));
                }
            }
        }

        for synonyms in rings.values_mut() {
            synonyms.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            synonyms.dedup_by(|a, b| a.0 == b.0);
            synonyms.truncate(max_ring_size);
        }

        Self { rings }
    }

    /// Synonyms for `term` with their attenuated weights, best first.
    pub fn expand(&self, term: &AtomId) -> &[(AtomId, f32)] {
        self.rings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

fn is_lexical_variant(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    let common_prefix = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    common_prefix >= LEXICAL_PREFIX_MIN && a.len().abs_diff(b.len()) <= LEXICAL_LEN_DIFF_MAX
}

/// Read-mostly handle: readers see a stable snapshot via `Arc` clone;
/// `publish` swaps in a freshly rebuilt ring without blocking readers.
pub struct SynonymRingHandle(RwLock<Arc<SynonymRing>>);

impl SynonymRingHandle {
    pub fn new(ring: SynonymRing) -> Self {
        Self(RwLock::new(Arc::new(ring)))
    }

    pub fn snapshot(&self) -> Arc<SynonymRing> {
        Arc::clone(&self.0.read().unwrap())
    }

    pub fn publish(&self, ring: SynonymRing) {
        *self.0.write().unwrap() = Arc::new(ring);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooccurrence_neighbors_appear_in_ring() {
        let edges = vec![Edge::new(AtomId::new("adhd"), AtomId::new("diagnosis"), 5).unwrap()];
        let ring = SynonymRing::build(&edges, &[], 10);
        let expanded = ring.expand(&AtomId::new("adhd"));
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].0, AtomId::new("diagnosis"));
    }

    #[test]
    fn ring_size_is_capped() {
        let edges: Vec<Edge> = (0..20)
            .map(|i| Edge::new(AtomId::new("hub"), AtomId::new(format!("leaf{i}")), i + 1).unwrap())
            .collect();
        let ring = SynonymRing::build(&edges, &[], 5);
        assert_eq!(ring.expand(&AtomId::new("hub")).len(), 5);
    }

    #[test]
    fn lexical_variants_are_detected() {
        let known = vec![AtomId::new("diagnose"), AtomId::new("diagnosis")];
        let ring = SynonymRing::build(&[], &known, 10);
        let expanded = ring.expand(&AtomId::new("diagnose"));
        assert!(expanded.iter().any(|(t, _)| t == &AtomId::new("diagnosis")));
    }

    #[test]
    fn unrelated_terms_have_no_ring() {
        let ring = SynonymRing::build(&[], &[], 10);
        assert!(ring.expand(&AtomId::new("anything")).is_empty());
    }

    #[test]
    fn handle_publish_swaps_snapshot_without_blocking_readers() {
        let handle = SynonymRingHandle::new(SynonymRing::default());
        let before = handle.snapshot();
        assert!(before.is_empty());

        let edges = vec![Edge::new(AtomId::new("a"), AtomId::new("b"), 1).unwrap()];
        handle.publish(SynonymRing::build(&edges, &[], 10));
        let after = handle.snapshot();
        assert!(!after.is_empty());
        assert!(before.is_empty());
    }
}
