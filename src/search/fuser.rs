//! Gravity fuser: scores, deduplicates, and budget-enforces the merged
//! planet + moon candidate set (spec §4.11).

use crate::config::FusionWeights;
use crate::fingerprint::Fingerprint;
use crate::model::{AtomId, Molecule};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Planet,
    Moon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Fts,
    Vector,
    Walker,
}

#[derive(Debug, Clone)]
pub struct ProvenancePath {
    pub source: SourceKind,
    /// Atom chain for walker hits; empty for planet hits.
    pub atom_chain: Vec<AtomId>,
}

/// A pre-fusion candidate molecule plus the raw per-signal scores the
/// planet searcher and tag-walker produced for it.
#[derive(Debug, Clone)]
pub struct FusionCandidate {
    pub molecule: Molecule,
    pub fts_score: f32,
    pub vector_score: f32,
    pub walker_gravity: f32,
    pub class: Class,
    pub provenance: ProvenancePath,
}

#[derive(Debug, Clone)]
pub struct FusedResult {
    pub molecule: Molecule,
    pub gravity: f32,
    pub class: Class,
    pub provenance: ProvenancePath,
}

/// Fuse, deduplicate, and budget-enforce `candidates` against `max_chars`.
#[allow(clippy::too_many_arguments)]
pub fn fuse(
    candidates: Vec<FusionCandidate>,
    query_tags: &BTreeSet<AtomId>,
    walked_atoms: &BTreeSet<AtomId>,
    query_simhash: Fingerprint,
    now: DateTime<Utc>,
    weights: &FusionWeights,
    temporal_decay: f32,
    max_chars: usize,
    planet_share: f32,
    ascending: bool,
) -> Vec<FusedResult> {
    let relevant_atoms: BTreeSet<AtomId> = query_tags.union(walked_atoms).cloned().collect();

    let mut scored: Vec<FusedResult> = candidates
        .into_iter()
        .map(|c| {
            let gravity = score(&c, &relevant_atoms, query_simhash, now, weights, temporal_decay);
            FusedResult {
                molecule: c.molecule,
                gravity,
                class: c.class,
                provenance: c.provenance,
            }
        })
        .collect();

    scored = dedup(scored);

    if ascending {
        scored.sort_by(|a, b| a.molecule.timestamp.cmp(&b.molecule.timestamp));
    } else {
        scored.sort_by(|a, b| b.gravity.partial_cmp(&a.gravity).unwrap_or(std::cmp::Ordering::Equal));
    }

    enforce_budget(scored, max_chars, planet_share)
}

fn score(
    c: &FusionCandidate,
    relevant_atoms: &BTreeSet<AtomId>,
    query_simhash: Fingerprint,
    now: DateTime<Utc>,
    weights: &FusionWeights,
    temporal_decay: f32,
) -> f32 {
    let shared_tags = if relevant_atoms.is_empty() {
        0.0
    } else {
        let overlap = c.molecule.tags.intersection(relevant_atoms).count();
        overlap as f32 / relevant_atoms.len() as f32
    };

    let time_decay = if temporal_decay == 0.0 {
        1.0
    } else {
        let age_ms = (now - c.molecule.timestamp).num_milliseconds().max(0) as f32;
        (-temporal_decay * age_ms).exp()
    };

    let content_sim = 1.0 - (query_simhash.hamming_distance(c.molecule.simhash) as f32 / 64.0);

    weights.shared_tags * shared_tags
        + weights.time_decay * time_decay
        + weights.content_sim * content_sim
        + weights.lexical_score * c.fts_score
        + weights.vector_score * c.vector_score
        + weights.walker_gravity * c.walker_gravity
}

/// Union-find over the "Hamming distance < 5" relation: each bucket's
/// highest-gravity representative survives, tie-broken by more recent
/// timestamp, then shorter content, then stable id order.
fn dedup(mut candidates: Vec<FusedResult>) -> Vec<FusedResult> {
    let n = candidates.len();
    if n <= 1 {
        return candidates;
    }
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if candidates[i].molecule.simhash.hamming_distance(candidates[j].molecule.simhash) < 5 {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut groups: std::collections::BTreeMap<usize, Vec<usize>> = std::collections::BTreeMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut kept = Vec::new();
    let keep_set: BTreeSet<usize> = groups
        .values()
        .map(|members| {
            *members
                .iter()
                .max_by(|&&a, &&b| {
                    candidates[a]
                        .gravity
                        .partial_cmp(&candidates[b].gravity)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| candidates[a].molecule.timestamp.cmp(&candidates[b].molecule.timestamp))
                        .then_with(|| candidates[b].molecule.byte_len().cmp(&candidates[a].molecule.byte_len()))
                        .then_with(|| candidates[b].molecule.id.as_str().cmp(candidates[a].molecule.id.as_str()))
                })
                .unwrap()
        })
        .collect();
    for (i, candidate) in candidates.into_iter().enumerate() {
        if keep_set.contains(&i) {
            kept.push(candidate);
        }
    }
    kept
}

/// Partition into planets/moons, greedily filling each class's budget in
/// gravity (or timestamp) order; a candidate that doesn't fit its own
/// class's remaining budget is skipped, never overflowed into the other.
fn enforce_budget(candidates: Vec<FusedResult>, max_chars: usize, planet_share: f32) -> Vec<FusedResult> {
    let planet_budget = (max_chars as f32 * planet_share) as usize;
    let moon_budget = max_chars - planet_budget;

    let mut planet_total = 0usize;
    let mut moon_total = 0usize;
    let mut out = Vec::new();

    for candidate in candidates {
        let len = candidate.molecule.byte_len();
        match candidate.class {
            Class::Planet => {
                if planet_total + len <= planet_budget {
                    planet_total += len;
                    out.push(candidate);
                }
            }
            Class::Moon => {
                if moon_total + len <= moon_budget {
                    moon_total += len;
                    out.push(candidate);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompoundId, MoleculeType};

    fn molecule(id: &str, byte_len: usize, simhash: u64) -> Molecule {
        let mut m = Molecule::new(
            CompoundId::from_string("c1"),
            0,
            0,
            byte_len,
            MoleculeType::Prose,
            Fingerprint(simhash),
            4,
        );
        m.id = crate::model::MoleculeId::from_string(id);
        m
    }

    fn candidate(m: Molecule, class: Class) -> FusionCandidate {
        FusionCandidate {
            molecule: m,
            fts_score: 1.0,
            vector_score: 0.0,
            walker_gravity: 0.0,
            class,
            provenance: ProvenancePath {
                source: SourceKind::Fts,
                atom_chain: vec![],
            },
        }
    }

    #[test]
    fn exact_match_has_high_gravity() {
        let m = molecule("a", 40, 0);
        let candidates = vec![candidate(m, Class::Planet)];
        let results = fuse(
            candidates,
            &BTreeSet::new(),
            &BTreeSet::new(),
            Fingerprint(0),
            Utc::now(),
            &FusionWeights::default(),
            0.0,
            1000,
            0.7,
            false,
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].gravity > 0.5);
    }

    #[test]
    fn dedup_keeps_one_of_near_duplicates() {
        let a = molecule("a", 40, 0);
        let b = molecule("b", 40, 0b1); // hamming distance 1, below threshold 5
        let results = fuse(
            vec![candidate(a, Class::Planet), candidate(b, Class::Planet)],
            &BTreeSet::new(),
            &BTreeSet::new(),
            Fingerprint(0),
            Utc::now(),
            &FusionWeights::default(),
            0.0,
            1000,
            0.7,
            false,
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn budget_split_is_never_exceeded() {
        let candidates: Vec<FusionCandidate> = (0..10)
            .map(|i| candidate(molecule(&format!("p{i}"), 150, i as u64 * 1000), Class::Planet))
            .chain((0..10).map(|i| candidate(molecule(&format!("m{i}"), 150, i as u64 * 37 + 1), Class::Moon)))
            .collect();
        let results = fuse(
            candidates,
            &BTreeSet::new(),
            &BTreeSet::new(),
            Fingerprint(0),
            Utc::now(),
            &FusionWeights::default(),
            0.0,
            1000,
            0.7,
            false,
        );
        let planet_total: usize = results.iter().filter(|r| r.class == Class::Planet).map(|r| r.molecule.byte_len()).sum();
        let moon_total: usize = results.iter().filter(|r| r.class == Class::Moon).map(|r| r.molecule.byte_len()).sum();
        assert!(planet_total <= 700);
        assert!(moon_total <= 300);
    }

    #[test]
    fn ascending_sort_overrides_gravity_order() {
        use chrono::Duration;
        let now = Utc::now();
        let mut older = molecule("old", 10, 0);
        older.timestamp = now - Duration::days(10);
        let mut newer = molecule("new", 10, 0b111111);
        newer.timestamp = now;

        let results = fuse(
            vec![candidate(newer, Class::Planet), candidate(older, Class::Planet)],
            &BTreeSet::new(),
            &BTreeSet::new(),
            Fingerprint(0),
            now,
            &FusionWeights::default(),
            0.0,
            1000,
            0.7,
            true,
        );
        assert_eq!(results[0].molecule.id.as_str(), "old");
    }
}
