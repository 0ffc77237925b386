//! Runtime configuration, including the recall-mode presets that drive the
//! tag-walker and gravity fuser.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A named preset that expands into the walker/fuser knobs below. Presets
/// exist so callers (MCP clients, the CLI) choose a recall posture by name
/// instead of tuning six interacting numbers by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecallMode {
    Maximum,
    Balanced,
    Focused,
}

impl RecallMode {
    pub fn params(self) -> WalkerParams {
        match self {
            RecallMode::Maximum => WalkerParams {
                max_hops: 4,
                temporal_decay: 0.02,
                damping: 0.55,
                min_relevance: 0.05,
                temperature: 0.9,
                gravity_threshold: 0.15,
                max_per_hop: 12,
            },
            RecallMode::Balanced => WalkerParams {
                max_hops: 3,
                temporal_decay: 0.05,
                damping: 0.65,
                min_relevance: 0.12,
                temperature: 0.6,
                gravity_threshold: 0.25,
                max_per_hop: 8,
            },
            RecallMode::Focused => WalkerParams {
                max_hops: 2,
                temporal_decay: 0.1,
                damping: 0.8,
                min_relevance: 0.25,
                temperature: 0.3,
                gravity_threshold: 0.4,
                max_per_hop: 5,
            },
        }
    }
}

impl Default for RecallMode {
    fn default() -> Self {
        RecallMode::Balanced
    }
}

/// Tag-walker and gravity fuser parameters (spec §4.8, §4.9 Open Questions
/// resolved as the `Balanced` defaults below).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkerParams {
    pub max_hops: u8,
    pub temporal_decay: f32,
    pub damping: f32,
    pub min_relevance: f32,
    pub temperature: f32,
    pub gravity_threshold: f32,
    pub max_per_hop: usize,
}

/// Fusion weights for combining the planet searcher and tag-walker signals
/// into a single gravity score (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub shared_tags: f32,
    pub time_decay: f32,
    pub content_sim: f32,
    pub lexical_score: f32,
    pub vector_score: f32,
    pub walker_gravity: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            shared_tags: 0.15,
            time_decay: 0.1,
            content_sim: 0.1,
            lexical_score: 0.25,
            vector_score: 0.3,
            walker_gravity: 0.1,
        }
    }
}

/// Top-level configuration for a running retrieval core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the filesystem mirror (source-of-truth compound bytes).
    pub mirror_root: PathBuf,
    /// Path to the sqlite index database (disposable, rebuildable).
    pub index_path: PathBuf,
    pub recall_mode: RecallMode,
    pub fusion_weights: FusionWeights,
    /// Character budget for an assembled context window (spec §4.11).
    pub context_budget_chars: usize,
    /// Planet/moon split of `context_budget_chars` (spec §8 scenario: 70/30).
    pub planet_share: f32,
    /// Query deadline; queries exceeding this return `StarError::Deadline`.
    pub query_deadline_ms: u64,
    /// Embedding vector dimensionality, fixed at startup by the active embedder.
    pub embedding_dim: usize,
}

impl Config {
    pub fn walker_params(&self) -> WalkerParams {
        self.recall_mode.params()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mirror_root: PathBuf::from("./star-mirror"),
            index_path: PathBuf::from("./star-index.sqlite3"),
            recall_mode: RecallMode::default(),
            fusion_weights: FusionWeights::default(),
            context_budget_chars: 8_000,
            planet_share: 0.7,
            query_deadline_ms: 2_000,
            embedding_dim: 384,
        }
    }
}
