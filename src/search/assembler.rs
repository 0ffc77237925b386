//! Context assembler: inflates fused molecule hits to text and packs them
//! into a single budgeted context string (spec §4.12).

use crate::error::StarError;
use crate::mirror::MirrorStore;
use crate::model::MoleculeId;
use crate::search::fuser::{Class, FusedResult, SourceKind};

/// Per-molecule metadata returned alongside the assembled context.
#[derive(Debug, Clone)]
pub struct ResultMeta {
    pub molecule_id: MoleculeId,
    pub gravity: f32,
    pub class: Class,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub context: String,
    pub results: Vec<ResultMeta>,
    /// Ids whose mirror file was missing at assembly time; flagged for reindex.
    pub reindex_pending: Vec<MoleculeId>,
}

/// Inflate `fused` results to text via `mirror`, respecting `max_chars`
/// exactly. Molecules are appended in the order they arrive (already
/// gravity/timestamp-sorted and budget-partitioned by the fuser); a
/// molecule whose text would overflow the remaining budget is truncated at
/// the last safe UTF-8 boundary rather than dropped, so the final context
/// never exceeds `max_chars` but uses as much of it as fits.
pub fn assemble(fused: Vec<FusedResult>, mirror: &MirrorStore, max_chars: usize) -> AssembledContext {
    let mut context = String::new();
    let mut results = Vec::new();
    let mut reindex_pending = Vec::new();

    for hit in fused {
        if context.len() >= max_chars {
            break;
        }
        let compound_id = hit.molecule.compound_id.as_str();
        let bytes = match mirror.read_range(compound_id, hit.molecule.start_byte, hit.molecule.end_byte) {
            Ok(bytes) => bytes,
            Err(StarError::MirrorMiss(_)) => {
                reindex_pending.push(hit.molecule.id.clone());
                continue;
            }
            Err(_) => {
                reindex_pending.push(hit.molecule.id.clone());
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);

        let marker = format!(
            "[source={:?} provenance={:?} gravity={:.3}]\n",
            hit.provenance.source, hit.class, hit.gravity
        );
        let remaining = max_chars.saturating_sub(context.len());
        if remaining <= marker.len() {
            break;
        }
        context.push_str(&marker);

        let remaining = max_chars.saturating_sub(context.len());
        let chunk = truncate_to_char_boundary(&text, remaining);
        context.push_str(chunk);
        context.push('\n');

        results.push(ResultMeta {
            molecule_id: hit.molecule.id.clone(),
            gravity: hit.gravity,
            class: hit.class,
            source: hit.provenance.source,
        });
    }

    AssembledContext {
        context,
        results,
        reindex_pending,
    }
}

/// Truncate `text` to at most `max_len` bytes, walking back to the nearest
/// UTF-8 character boundary so the result is always valid `str`.
fn truncate_to_char_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
