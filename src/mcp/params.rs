//! MCP tool parameter structs with schemars-derived JSON schemas.

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "The search query text")]
    pub query: String,
    #[schemars(description = "Restrict results to these buckets")]
    pub buckets: Option<Vec<String>>,
    #[schemars(description = "Restrict results to molecules carrying any of these tags")]
    pub tags: Option<Vec<String>>,
    #[schemars(description = "Restrict results to this provenance class: internal, external, or quarantine")]
    pub provenance: Option<String>,
    #[schemars(description = "Character budget for the assembled context, defaults to the configured budget")]
    pub max_chars: Option<usize>,
    #[schemars(description = "Weight applied to code molecules when the query has no code markers (0.0-1.0)")]
    pub code_weight: Option<f32>,
    #[schemars(description = "Recall posture: maximum, balanced, or focused")]
    pub recall_mode: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IngestParams {
    #[schemars(description = "Raw content to sanitize, atomize, tag, embed, and index")]
    pub content: String,
    #[schemars(description = "A stable identifier for this compound, e.g. a file path")]
    pub source_path: String,
    #[schemars(description = "Atomizer strategy hint: prose, code, or data")]
    pub molecule_type: Option<String>,
    #[schemars(description = "Buckets to tag every molecule from this compound with")]
    pub buckets: Option<Vec<String>>,
    #[schemars(description = "Seed tags to apply alongside whatever the tagger derives")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoleculeIdParams {
    #[schemars(description = "Molecule id returned from a previous search or ingest call")]
    pub molecule_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateContentParams {
    #[schemars(description = "Molecule id to rewrite")]
    pub molecule_id: String,
    #[schemars(description = "Replacement text for this molecule's byte range")]
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTagsParams {
    #[schemars(description = "Restrict the tag vocabulary to these buckets")]
    pub buckets: Option<Vec<String>>,
}
