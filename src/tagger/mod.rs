//! Tagger: derives the `tags` set for a molecule via the "infection model"
//! (seed keyword scan, neighbor intersection, frequency cap).

use crate::model::AtomId;
use std::collections::{BTreeMap, BTreeSet};

/// Keyword → canonical tag lookup, provided by the caller (an ingest-time
/// configuration asset, not derived per molecule).
pub type SeedDictionary = BTreeMap<String, AtomId>;

/// Derive the tag set for one molecule.
///
/// `is_over_frequency_cap` is queried once per candidate tag against the
/// corpus-wide frequency table the index store maintains — callers pass a
/// closure over that table rather than this function touching storage
/// directly, keeping the tagger pure and deterministic.
pub fn derive_tags(
    text: &str,
    seed_dict: &SeedDictionary,
    prev_tags: &BTreeSet<AtomId>,
    next_tags: &BTreeSet<AtomId>,
    is_over_frequency_cap: impl Fn(&AtomId) -> bool,
) -> BTreeSet<AtomId> {
    let lowered = text.to_lowercase();
    let mut tags = BTreeSet::new();

    for (keyword, tag) in seed_dict {
        if contains_keyword(&lowered, keyword) {
            tags.insert(tag.clone());
        }
    }

    // Local infection: a tag shared by the previous and next molecule in
    // the same compound "infects" this one, even if no seed keyword fired.
    tags.extend(prev_tags.intersection(next_tags).cloned());

    tags.into_iter().filter(|t| !is_over_frequency_cap(t)).collect()
}

fn contains_keyword(lowered_text: &str, keyword: &str) -> bool {
    lowered_text.contains(&keyword.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(pairs: &[(&str, &str)]) -> SeedDictionary {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AtomId::new(*v)))
            .collect()
    }

    #[test]
    fn pattern_scan_matches_case_insensitively() {
        let seed = dict(&[("adhd", "adhd")]);
        let empty = BTreeSet::new();
        let tags = derive_tags("Discussing ADHD symptoms", &seed, &empty, &empty, |_| false);
        assert!(tags.contains(&AtomId::new("adhd")));
    }

    #[test]
    fn local_infection_adds_shared_neighbor_tags() {
        let seed = SeedDictionary::new();
        let prev: BTreeSet<AtomId> = [AtomId::new("chronos"), AtomId::new("project")]
            .into_iter()
            .collect();
        let next: BTreeSet<AtomId> = [AtomId::new("chronos")].into_iter().collect();
        let tags = derive_tags("no keywords here", &seed, &prev, &next, |_| false);
        assert_eq!(tags, [AtomId::new("chronos")].into_iter().collect());
    }

    #[test]
    fn frequency_cap_drops_stopword_tags() {
        let seed = dict(&[("the", "the")]);
        let empty = BTreeSet::new();
        let tags = derive_tags("the quick fox", &seed, &empty, &empty, |t| t.as_str() == "the");
        assert!(!tags.contains(&AtomId::new("the")));
    }

    #[test]
    fn derivation_is_deterministic() {
        let seed = dict(&[("adhd", "adhd"), ("diagnosis", "diagnosis")]);
        let prev: BTreeSet<AtomId> = [AtomId::new("july")].into_iter().collect();
        let next: BTreeSet<AtomId> = [AtomId::new("july")].into_iter().collect();
        let a = derive_tags("ADHD diagnosis notes", &seed, &prev, &next, |_| false);
        let b = derive_tags("ADHD diagnosis notes", &seed, &prev, &next, |_| false);
        assert_eq!(a, b);
    }

    #[test]
    fn tags_are_well_formed() {
        let seed = dict(&[("weird!!punct", "weird punct")]);
        let empty = BTreeSet::new();
        let tags = derive_tags("weird!!punct here", &seed, &empty, &empty, |_| false);
        for tag in &tags {
            assert!(!tag.as_str().is_empty());
            assert!(tag.as_str().len() <= 64);
            assert!(tag.as_str().chars().all(|c| !c.is_ascii_punctuation() || c == '-' || c == '_'));
        }
    }
}
