//! Planet searcher: direct FTS/ANN hits for a query (spec §4.9).

use crate::error::StarResult;
use crate::model::{MoleculeId, MoleculeType};
use crate::query::ParsedQuery;
use crate::storage::{IndexStore, MoleculeFilter, VectorIndex};
use crate::synonym::SynonymRing;
use std::collections::BTreeMap;

const CODE_MARKERS: &[&str] = &["```", "fn ", "function", "class ", "def ", "impl "];

#[derive(Debug, Clone, PartialEq)]
pub struct PlanetHit {
    pub molecule_id: MoleculeId,
    pub fts_score: f32,
    pub vector_score: f32,
}

/// Run the planet search: FTS with synonym expansion, optionally merged
/// with an ANN pass over the query's own embedding, with bucket/tag/
/// provenance filters enforced at both stages.
pub fn search_planet(
    index: &dyn IndexStore,
    vector_index: Option<&dyn VectorIndex>,
    parsed: &ParsedQuery,
    synonyms: &SynonymRing,
    query_embedding: Option<&[f32]>,
    filter: &MoleculeFilter,
    top_k: usize,
    code_weight: f32,
) -> StarResult<Vec<PlanetHit>> {
    let expanded_keywords = expand_keywords(parsed, synonyms);
    let fts_hits = index.fts_search(&expanded_keywords, filter, top_k)?;

    let mut merged: BTreeMap<MoleculeId, PlanetHit> = BTreeMap::new();
    for (id, score) in fts_hits {
        merged.insert(
            id.clone(),
            PlanetHit {
                molecule_id: id,
                fts_score: score,
                vector_score: 0.0,
            },
        );
    }

    if let (Some(vector_index), Some(embedding)) = (vector_index, query_embedding) {
        let ann_hits = vector_index.ann_search(embedding, top_k)?;
        for (id, score) in ann_hits {
            if !filter_passes(index, filter, &id)? {
                continue;
            }
            merged
                .entry(id.clone())
                .and_modify(|hit| hit.vector_score = score)
                .or_insert(PlanetHit {
                    molecule_id: id,
                    fts_score: 0.0,
                    vector_score: score,
                });
        }
    }

    let query_has_code_markers = has_code_markers(&parsed.raw);
    let mut hits: Vec<PlanetHit> = merged.into_values().collect();
    if !query_has_code_markers && code_weight < 1.0 {
        for hit in hits.iter_mut() {
            if let Some(molecule) = index.get_molecule(&hit.molecule_id)? {
                if molecule.molecule_type == MoleculeType::Code {
                    hit.fts_score *= code_weight;
                    hit.vector_score *= code_weight;
                }
            }
        }
    }

    hits.sort_by(|a, b| {
        let score_a = a.fts_score.max(a.vector_score);
        let score_b = b.fts_score.max(b.vector_score);
        score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    Ok(hits)
}

fn filter_passes(index: &dyn IndexStore, filter: &MoleculeFilter, id: &MoleculeId) -> StarResult<bool> {
    Ok(index
        .get_molecule(id)?
        .map(|m| filter.matches(&m))
        .unwrap_or(false))
}

fn expand_keywords(parsed: &ParsedQuery, synonyms: &SynonymRing) -> Vec<String> {
    let mut expanded: Vec<String> = parsed.keywords.iter().cloned().collect();
    for tag in &parsed.tag_hints {
        for (synonym, weight) in synonyms.expand(tag) {
            if *weight > 0.0 {
                expanded.push(synonym.as_str().to_string());
            }
        }
    }
    expanded
}

fn has_code_markers(query: &str) -> bool {
    let lowered = query.to_lowercase();
    CODE_MARKERS.iter().any(|m| lowered.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{Compound, CompoundId, ContentHash, Molecule};
    use crate::query::{parse_query, QueryOptions};
    use crate::storage::SqliteStore;
    use std::collections::BTreeSet;

    fn setup() -> (SqliteStore, CompoundId) {
        let store = SqliteStore::open_in_memory().unwrap();
        let compound_id = CompoundId::from_string("c1");
        store
            .upsert_compound(&Compound::new(compound_id.clone(), "c1.md", ContentHash::of("x")))
            .unwrap();
        (store, compound_id)
    }

    #[test]
    fn planet_search_finds_direct_fts_hit() {
        let (store, compound_id) = setup();
        let molecule = Molecule::new(
            compound_id,
            0,
            0,
            10,
            MoleculeType::Prose,
            crate::fingerprint::Fingerprint(0),
            4,
        );
        store
            .upsert_molecule(&molecule, "Project Chronos explores infinite context")
            .unwrap();

        let config = Config::default();
        let parsed = parse_query("Chronos", QueryOptions::default(), &BTreeSet::new(), &config).unwrap();
        let synonyms = SynonymRing::default();
        let hits = search_planet(&store, None, &parsed, &synonyms, None, &MoleculeFilter::new(), 10, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].molecule_id, molecule.id);
    }

    #[test]
    fn code_penalty_applies_when_no_code_markers_in_query() {
        let (store, compound_id) = setup();
        let molecule = Molecule::new(
            compound_id,
            0,
            0,
            10,
            MoleculeType::Code,
            crate::fingerprint::Fingerprint(0),
            4,
        );
        store.upsert_molecule(&molecule, "fn parse_budget() {}").unwrap();

        let config = Config::default();
        let parsed = parse_query("budget", QueryOptions::default(), &BTreeSet::new(), &config).unwrap();
        let synonyms = SynonymRing::default();
        let hits = search_planet(&store, None, &parsed, &synonyms, None, &MoleculeFilter::new(), 10, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].fts_score < 1.0);
    }

    #[test]
    fn bucket_filter_excludes_other_buckets() {
        let (store, compound_id) = setup();
        let molecule =
            Molecule::new(compound_id, 0, 0, 10, MoleculeType::Prose, crate::fingerprint::Fingerprint(0), 4)
                .with_buckets(["work".to_string()]);
        store.upsert_molecule(&molecule, "budget planning").unwrap();

        let config = Config::default();
        let parsed = parse_query("budget", QueryOptions::default(), &BTreeSet::new(), &config).unwrap();
        let synonyms = SynonymRing::default();
        let filter = MoleculeFilter::new().with_buckets(vec!["personal".to_string()]);
        let hits = search_planet(&store, None, &parsed, &synonyms, None, &filter, 10, 0.5).unwrap();
        assert!(hits.is_empty());
    }
}
