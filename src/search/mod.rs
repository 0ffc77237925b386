//! Query-time orchestration: parse → synonym expansion → planet searcher +
//! tag-walker (concurrent) → gravity fuser → context assembler.

mod assembler;
mod fuser;
mod planet;
mod walker;

pub use assembler::{assemble, AssembledContext, ResultMeta};
pub use fuser::{fuse, Class, FusedResult, FusionCandidate, ProvenancePath, SourceKind};
pub use planet::{search_planet, PlanetHit};
pub use walker::{walk, AtomHit};

use crate::config::Config;
use crate::embedding::{EmbedOutcome, Embedder};
use crate::error::StarResult;
use crate::fingerprint::SimHasher;
use crate::mirror::MirrorStore;
use crate::model::AtomId;
use crate::query::{parse_query, ParsedQuery, QueryOptions};
use crate::storage::{IndexStore, MoleculeFilter, VectorIndex};
use crate::synonym::SynonymRing;
use chrono::Utc;
use std::collections::BTreeMap;

/// Candidates per source are capped here before fusion; the fuser's own
/// budget enforcement then trims to `context_budget_chars`.
const TOP_K: usize = 40;

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub context: String,
    pub results: Vec<ResultMeta>,
    pub strategy: String,
    pub split_queries: Vec<String>,
    pub status: String,
    pub reindex_pending: Vec<crate::model::MoleculeId>,
}

/// Run a full query: parse, expand, search planet + walker concurrently,
/// fuse, and assemble a context string. Returns `status = "partial"` (with
/// whatever was computed so far) if `config.query_deadline_ms` elapses
/// before the pipeline finishes.
#[allow(clippy::too_many_arguments)]
pub async fn search(
    raw_query: &str,
    options: QueryOptions,
    index: &dyn IndexStore,
    vector_index: Option<&dyn VectorIndex>,
    mirror: &MirrorStore,
    embedder: &dyn Embedder,
    synonyms: &SynonymRing,
    config: &Config,
) -> StarResult<SearchResponse> {
    let deadline = std::time::Duration::from_millis(config.query_deadline_ms);
    match tokio::time::timeout(deadline, run(raw_query, options, index, vector_index, mirror, embedder, synonyms, config)).await {
        Ok(result) => result,
        Err(_) => Ok(SearchResponse {
            context: String::new(),
            results: Vec::new(),
            strategy: "timeout".to_string(),
            split_queries: Vec::new(),
            status: "partial".to_string(),
            reindex_pending: Vec::new(),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    raw_query: &str,
    options: QueryOptions,
    index: &dyn IndexStore,
    vector_index: Option<&dyn VectorIndex>,
    mirror: &MirrorStore,
    embedder: &dyn Embedder,
    synonyms: &SynonymRing,
    config: &Config,
) -> StarResult<SearchResponse> {
    let known_tags: std::collections::BTreeSet<AtomId> = index.list_tags(None)?.into_iter().collect();
    let parsed = parse_query(raw_query, options, &known_tags, config)?;

    let filter = build_filter(&parsed);
    let walker_params = parsed
        .options
        .recall_mode
        .map(|m| m.params())
        .unwrap_or_else(|| config.walker_params());
    let max_chars = parsed.options.max_chars.unwrap_or(config.context_budget_chars);
    let code_weight = parsed.options.code_weight.unwrap_or(0.5);

    let query_embedding = match embedder.embed_batch(&[parsed.raw.as_str()]) {
        Ok(mut outcomes) => match outcomes.pop() {
            Some(EmbedOutcome::Embedded(v)) => Some(v),
            _ => None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "query embedding failed, falling back to lexical-only search");
            None
        }
    };

    let (planet_hits, walked_atoms) = tokio::join!(
        run_planet(index, vector_index, &parsed, synonyms, query_embedding.as_deref(), &filter, code_weight),
        run_walker(index, &parsed, &known_tags, &walker_params)
    );
    let planet_hits = planet_hits?;
    let walked_atoms = walked_atoms?;

    let candidates = build_candidates(index, &planet_hits, &walked_atoms, query_embedding.as_deref(), &filter)?;

    let query_simhash = SimHasher::default().fingerprint(&parsed.raw);
    let fused = fuse(
        candidates,
        &parsed.tag_hints,
        &walked_atoms.keys().cloned().collect(),
        query_simhash,
        Utc::now(),
        &config.fusion_weights,
        walker_params.temporal_decay,
        max_chars,
        config.planet_share,
        parsed.ascending,
    );

    let assembled = assemble(fused, mirror, max_chars);

    Ok(SearchResponse {
        context: assembled.context,
        results: assembled.results,
        strategy: "planet+walker".to_string(),
        split_queries: parsed.clauses,
        status: "ok".to_string(),
        reindex_pending: assembled.reindex_pending,
    })
}

fn build_filter(parsed: &ParsedQuery) -> MoleculeFilter {
    let mut filter = MoleculeFilter::new();
    if let Some(buckets) = parsed.options.buckets.clone() {
        filter = filter.with_buckets(buckets);
    }
    if let Some(tags) = parsed.options.tags.clone() {
        filter = filter.with_tags(tags);
    }
    if let Some(provenance) = parsed.options.provenance {
        filter = filter.with_provenance(provenance);
    }
    filter
}

async fn run_planet(
    index: &dyn IndexStore,
    vector_index: Option<&dyn VectorIndex>,
    parsed: &ParsedQuery,
    synonyms: &SynonymRing,
    query_embedding: Option<&[f32]>,
    filter: &MoleculeFilter,
    code_weight: f32,
) -> StarResult<Vec<PlanetHit>> {
    search_planet(index, vector_index, parsed, synonyms, query_embedding, filter, TOP_K, code_weight)
}

async fn run_walker(
    index: &dyn IndexStore,
    parsed: &ParsedQuery,
    known_tags: &std::collections::BTreeSet<AtomId>,
    params: &crate::config::WalkerParams,
) -> StarResult<BTreeMap<AtomId, AtomHit>> {
    let seeds: Vec<AtomId> = parsed
        .tag_hints
        .iter()
        .cloned()
        .chain(parsed.keywords.iter().filter_map(|k| {
            let candidate = AtomId::new(k.clone());
            known_tags.contains(&candidate).then_some(candidate)
        }))
        .collect();

    if seeds.is_empty() {
        return Ok(BTreeMap::new());
    }

    let edges_for = |atom: &AtomId| {
        index.edges_for_atom(atom).unwrap_or_else(|e| {
            tracing::warn!(atom = %atom, error = %e, "edge lookup failed during walk, treating as dead end");
            Vec::new()
        })
    };
    let mut rng = rand::thread_rng();
    let hits = walk(&seeds, edges_for, params, &mut rng);
    Ok(hits)
}

/// Merge planet hits and walker hits into fusion candidates, fetching each
/// molecule's full record from the index store.
fn build_candidates(
    index: &dyn IndexStore,
    planet_hits: &[PlanetHit],
    walked_atoms: &BTreeMap<AtomId, AtomHit>,
    query_embedding: Option<&[f32]>,
    filter: &MoleculeFilter,
) -> StarResult<Vec<FusionCandidate>> {
    let mut candidates = Vec::new();

    for hit in planet_hits {
        if let Some(molecule) = index.get_molecule(&hit.molecule_id)? {
            let vector_score = if let Some(query_vec) = query_embedding {
                crate::embedding::cosine_similarity(query_vec, &molecule.embedding).max(hit.vector_score)
            } else {
                hit.vector_score
            };
            candidates.push(FusionCandidate {
                molecule,
                fts_score: hit.fts_score,
                vector_score,
                walker_gravity: 0.0,
                class: Class::Planet,
                provenance: ProvenancePath {
                    source: if hit.vector_score > 0.0 { SourceKind::Vector } else { SourceKind::Fts },
                    atom_chain: Vec::new(),
                },
            });
        }
    }

    let planet_ids: std::collections::BTreeSet<_> = candidates.iter().map(|c| c.molecule.id.clone()).collect();

    if !walked_atoms.is_empty() {
        let tags: Vec<AtomId> = walked_atoms.keys().cloned().collect();
        let moon_molecules = index.molecules_by_tags(&tags, TOP_K)?;
        for molecule in moon_molecules {
            if planet_ids.contains(&molecule.id) || !filter.matches(&molecule) {
                continue;
            }
            let best_gravity = molecule
                .tags
                .iter()
                .filter_map(|t| walked_atoms.get(t))
                .map(|hit| hit.gravity)
                .fold(0.0f32, f32::max);
            let atom_chain: Vec<AtomId> = molecule
                .tags
                .iter()
                .filter(|t| walked_atoms.contains_key(*t))
                .cloned()
                .collect();
            candidates.push(FusionCandidate {
                molecule,
                fts_score: 0.0,
                vector_score: 0.0,
                walker_gravity: best_gravity,
                class: Class::Moon,
                provenance: ProvenancePath {
                    source: SourceKind::Walker,
                    atom_chain,
                },
            });
        }
    }

    Ok(candidates)
}
