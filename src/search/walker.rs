//! Tag-walker: associative expansion over the atom co-occurrence graph
//! (spec §4.10).

use crate::config::WalkerParams;
use crate::model::{AtomId, Edge};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, BTreeMap};

/// Total-ordered wrapper around `f32` gravity values so they can live in a
/// `BinaryHeap` (plain `f32` isn't `Ord` because of NaN).
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedGravity(f32);

impl Eq for OrderedGravity {}

impl PartialOrd for OrderedGravity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedGravity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Best gravity and hop count at which an atom was reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomHit {
    pub gravity: f32,
    pub hops: u8,
}

/// Walk the atom co-occurrence graph outward from `seed_atoms`, returning
/// every atom reached (including the seeds themselves at hop 0) with its
/// best gravity and the hop count at which that best gravity was found.
///
/// `edges_for` looks up the co-occurrence edges touching a given atom —
/// callers back it with an index store or an in-memory adjacency map.
pub fn walk(
    seed_atoms: &[AtomId],
    edges_for: impl Fn(&AtomId) -> Vec<Edge>,
    params: &WalkerParams,
    rng: &mut impl Rng,
) -> BTreeMap<AtomId, AtomHit> {
    let mut candidates: BTreeMap<AtomId, AtomHit> = seed_atoms
        .iter()
        .map(|a| (a.clone(), AtomHit { gravity: 1.0, hops: 0 }))
        .collect();
    let mut frontier: Vec<(AtomId, f32, u8)> = seed_atoms.iter().map(|a| (a.clone(), 1.0, 0)).collect();

    let mut hop = 0u8;
    while !frontier.is_empty() && hop < params.max_hops {
        let chosen = select_for_expansion(&frontier, params, rng);

        // Gather every neighbor reachable this hop, deduped to its best
        // gravity, before capping: `max_per_hop` bounds how many atoms are
        // admitted per hop level, not just how many frontier atoms expand.
        let mut reached: BTreeMap<AtomId, (f32, u8)> = BTreeMap::new();
        for (atom, gravity, hops) in chosen {
            for edge in edges_for(&atom) {
                let neighbor = edge.other(&atom).clone();
                let propagated = gravity * params.damping;
                if propagated < params.gravity_threshold {
                    continue;
                }
                let next_hops = hops + 1;
                if next_hops > params.max_hops {
                    continue;
                }

                reached
                    .entry(neighbor)
                    .and_modify(|(best, best_hops)| {
                        if propagated > *best {
                            *best = propagated;
                            *best_hops = next_hops;
                        }
                    })
                    .or_insert((propagated, next_hops));
            }
        }

        let mut ranked: Vec<(AtomId, f32, u8)> = reached.into_iter().map(|(atom, (g, h))| (atom, g, h)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(params.max_per_hop);

        let mut next_frontier = Vec::with_capacity(ranked.len());
        for (neighbor, propagated, next_hops) in ranked {
            let should_update = candidates
                .get(&neighbor)
                .map(|hit| propagated > hit.gravity)
                .unwrap_or(true);
            if should_update {
                candidates.insert(
                    neighbor.clone(),
                    AtomHit {
                        gravity: propagated,
                        hops: next_hops,
                    },
                );
            }
            next_frontier.push((neighbor, propagated, next_hops));
        }
        frontier = next_frontier;
        hop += 1;
    }

    candidates
}

/// Pick up to `params.max_per_hop` atoms from `frontier` to expand this hop.
/// Deterministic (highest gravity first) unless a temperature roll fires,
/// in which case a weighted-random sample over the frontier's gravities
/// is used instead — this is what surfaces serendipitous neighbors.
fn select_for_expansion(
    frontier: &[(AtomId, f32, u8)],
    params: &WalkerParams,
    rng: &mut impl Rng,
) -> Vec<(AtomId, f32, u8)> {
    if frontier.is_empty() {
        return Vec::new();
    }

    let use_random = params.temperature > 0.0 && rng.gen::<f32>() < params.temperature;
    if !use_random {
        let mut heap: BinaryHeap<(OrderedGravity, usize)> = frontier
            .iter()
            .enumerate()
            .map(|(i, (_, g, _))| (OrderedGravity(*g), i))
            .collect();
        let mut chosen = Vec::new();
        while let Some((_, idx)) = heap.pop() {
            chosen.push(frontier[idx].clone());
            if chosen.len() >= params.max_per_hop {
                break;
            }
        }
        return chosen;
    }

    let weights: Vec<f32> = frontier.iter().map(|(_, g, _)| g.max(0.0001)).collect();
    let mut remaining: Vec<usize> = (0..frontier.len()).collect();
    let mut chosen = Vec::new();
    while !remaining.is_empty() && chosen.len() < params.max_per_hop {
        let remaining_weights: Vec<f32> = remaining.iter().map(|&i| weights[i]).collect();
        let dist = match WeightedIndex::new(&remaining_weights) {
            Ok(d) => d,
            Err(_) => break,
        };
        let pick = dist.sample(rng);
        let idx = remaining.remove(pick);
        chosen.push(frontier[idx].clone());
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(max_hops: u8, damping: f32, gravity_threshold: f32, max_per_hop: usize) -> WalkerParams {
        WalkerParams {
            max_hops,
            temporal_decay: 0.0,
            damping,
            min_relevance: 0.0,
            temperature: 0.0,
            gravity_threshold,
            max_per_hop,
        }
    }

    fn edge_map(pairs: &[(&str, &str, u32)]) -> Vec<Edge> {
        pairs
            .iter()
            .map(|(a, b, w)| Edge::new(AtomId::new(*a), AtomId::new(*b), *w).unwrap())
            .collect()
    }

    fn lookup(edges: Vec<Edge>) -> impl Fn(&AtomId) -> Vec<Edge> {
        move |atom: &AtomId| edges.iter().filter(|e| e.touches(atom)).cloned().collect()
    }

    #[test]
    fn seed_atoms_are_hop_zero_candidates() {
        let mut rng = StdRng::seed_from_u64(1);
        let edges = edge_map(&[]);
        let candidates = walk(
            &[AtomId::new("adhd")],
            lookup(edges),
            &params(2, 0.8, 0.1, 10),
            &mut rng,
        );
        assert_eq!(candidates.get(&AtomId::new("adhd")).unwrap().hops, 0);
    }

    #[test]
    fn two_hop_chain_reaches_third_atom() {
        // adhd -> diagnosis -> july 2025 event
        let edges = edge_map(&[("adhd", "diagnosis", 5), ("diagnosis", "july 2025 event", 5)]);
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = walk(
            &[AtomId::new("adhd")],
            lookup(edges),
            &params(2, 0.9, 0.01, 10),
            &mut rng,
        );
        let target = AtomId::new("july 2025 event");
        assert!(candidates.contains_key(&target));
        assert_eq!(candidates.get(&target).unwrap().hops, 2);
    }

    #[test]
    fn gravity_below_threshold_is_dropped() {
        let edges = edge_map(&[("a", "b", 1)]);
        let mut rng = StdRng::seed_from_u64(1);
        // damping so low that propagated gravity immediately falls below threshold
        let candidates = walk(&[AtomId::new("a")], lookup(edges), &params(3, 0.05, 0.5, 10), &mut rng);
        assert!(!candidates.contains_key(&AtomId::new("b")));
    }

    #[test]
    fn max_hops_bounds_the_walk() {
        let edges = edge_map(&[("a", "b", 1), ("b", "c", 1), ("c", "d", 1)]);
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = walk(&[AtomId::new("a")], lookup(edges), &params(1, 0.95, 0.01, 10), &mut rng);
        assert!(candidates.contains_key(&AtomId::new("b")));
        assert!(!candidates.contains_key(&AtomId::new("c")));
    }

    #[test]
    fn max_per_hop_caps_expansion_width() {
        let edges = edge_map(&[("hub", "l1", 5), ("hub", "l2", 4), ("hub", "l3", 3), ("hub", "l4", 2)]);
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = walk(&[AtomId::new("hub")], lookup(edges), &params(1, 0.9, 0.01, 2), &mut rng);
        let discovered = candidates.len() - 1; // exclude the seed itself
        assert!(discovered <= 2);
    }

    #[test]
    fn deterministic_at_zero_temperature() {
        let edges = edge_map(&[("a", "b", 5), ("b", "c", 5)]);
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(99);
        let a = walk(&[AtomId::new("a")], lookup(edges.clone()), &params(2, 0.9, 0.01, 10), &mut rng1);
        let b = walk(&[AtomId::new("a")], lookup(edges), &params(2, 0.9, 0.01, 10), &mut rng2);
        assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
    }
}
