//! Query parser: turns a raw query string into clauses, keywords, tag
//! hints, and a temporal sort hint.

use crate::config::Config;
use crate::error::StarError;
use crate::model::{AtomId, Provenance};
use std::collections::BTreeSet;

const MAX_QUERY_LEN: usize = 4_000;
const CLAUSE_TOKEN_THRESHOLD: usize = 12;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "in", "on", "for", "and", "or", "is", "are", "was", "were",
    "with", "about", "that", "this", "it", "as", "at", "by", "be", "note", "notes",
];

const TEMPORAL_ASCENDING_MARKERS: &[&str] = &["earliest", "oldest", "first"];

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub buckets: Option<Vec<String>>,
    pub tags: Option<Vec<AtomId>>,
    pub provenance: Option<Provenance>,
    pub max_chars: Option<usize>,
    pub code_weight: Option<f32>,
    pub recall_mode: Option<crate::config::RecallMode>,
}

#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub raw: String,
    pub clauses: Vec<String>,
    pub keywords: BTreeSet<String>,
    pub tag_hints: BTreeSet<AtomId>,
    pub ascending: bool,
    pub options: QueryOptions,
}

/// Parse `raw` into a `ParsedQuery` against the known tag vocabulary
/// (used to detect exact tag hints in the keyword set).
pub fn parse_query(
    raw: &str,
    options: QueryOptions,
    known_tags: &BTreeSet<AtomId>,
    _config: &Config,
) -> Result<ParsedQuery, StarError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StarError::QueryMalformed("query is empty".to_string()));
    }
    if trimmed.len() > MAX_QUERY_LEN {
        return Err(StarError::QueryMalformed(format!(
            "query exceeds maximum length of {MAX_QUERY_LEN} bytes"
        )));
    }

    let clauses = split_clauses(trimmed);
    let keywords = extract_keywords(trimmed);
    let tag_hints = keywords
        .iter()
        .filter_map(|k| {
            let candidate = AtomId::new(k.clone());
            known_tags.contains(&candidate).then_some(candidate)
        })
        .collect();
    let ascending = has_temporal_marker(&trimmed.to_lowercase());

    Ok(ParsedQuery {
        raw: trimmed.to_string(),
        clauses,
        keywords,
        tag_hints,
        ascending,
        options,
    })
}

/// Split into sentence-like clauses when the query is long (token count
/// above threshold) or contains a coordinating conjunction; short queries
/// are treated as a single clause.
fn split_clauses(query: &str) -> Vec<String> {
    let token_count = query.split_whitespace().count();
    let lowered = query.to_lowercase();
    let has_conjunction = [" and ", " but ", ";"].iter().any(|c| lowered.contains(c));

    if token_count < CLAUSE_TOKEN_THRESHOLD && !has_conjunction {
        return vec![query.to_string()];
    }

    query
        .split(|c| c == '.' || c == ';')
        .flat_map(|s| s.split(" and "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn extract_keywords(query: &str) -> BTreeSet<String> {
    query
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .map(|w| w.to_lowercase())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn has_temporal_marker(lowered_query: &str) -> bool {
    TEMPORAL_ASCENDING_MARKERS.iter().any(|m| lowered_query.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::default()
    }

    #[test]
    fn empty_query_is_malformed() {
        let err = parse_query("   ", QueryOptions::default(), &BTreeSet::new(), &cfg());
        assert!(matches!(err, Err(StarError::QueryMalformed(_))));
    }

    #[test]
    fn oversized_query_is_malformed() {
        let huge = "a".repeat(MAX_QUERY_LEN + 1);
        let err = parse_query(&huge, QueryOptions::default(), &BTreeSet::new(), &cfg());
        assert!(matches!(err, Err(StarError::QueryMalformed(_))));
    }

    #[test]
    fn short_query_is_a_single_clause() {
        let parsed = parse_query("Chronos", QueryOptions::default(), &BTreeSet::new(), &cfg()).unwrap();
        assert_eq!(parsed.clauses.len(), 1);
    }

    #[test]
    fn temporal_marker_sets_ascending() {
        let parsed = parse_query(
            "earliest note about X",
            QueryOptions::default(),
            &BTreeSet::new(),
            &cfg(),
        )
        .unwrap();
        assert!(parsed.ascending);
    }

    #[test]
    fn default_sort_is_descending() {
        let parsed = parse_query("Chronos", QueryOptions::default(), &BTreeSet::new(), &cfg()).unwrap();
        assert!(!parsed.ascending);
    }

    #[test]
    fn tag_hints_match_known_vocabulary() {
        let known: BTreeSet<AtomId> = [AtomId::new("adhd")].into_iter().collect();
        let parsed = parse_query("thoughts on adhd today", QueryOptions::default(), &known, &cfg()).unwrap();
        assert!(parsed.tag_hints.contains(&AtomId::new("adhd")));
    }

    #[test]
    fn keywords_exclude_stopwords() {
        let parsed = parse_query("the budget for the project", QueryOptions::default(), &BTreeSet::new(), &cfg())
            .unwrap();
        assert!(!parsed.keywords.contains("the"));
        assert!(parsed.keywords.contains("budget"));
    }
}
