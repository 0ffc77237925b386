//! Atomizer: splits sanitized content into byte-addressed molecules.
//!
//! Exposes a tagged variant (`AtomizerStrategy`) plus dispatch, rather than a
//! class hierarchy, per the "three strategies selected by molecule type"
//! design note: prose, code, and data (YAML/Markdown block) splitting all
//! produce the same `RawMolecule` shape.

use crate::model::MoleculeType;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

const MIN_PROSE_BYTES: usize = 80;
const MAX_PROSE_BYTES: usize = 2_000;
const MAX_CODE_BYTES: usize = 1_500;
const MAX_CODE_LINES: usize = 60;

/// The atomizer strategy selected for a compound, independent of how any
/// individual molecule it produces ends up classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomizerStrategy {
    Prose,
    Code,
    Data,
}

impl From<MoleculeType> for AtomizerStrategy {
    fn from(t: MoleculeType) -> Self {
        match t {
            MoleculeType::Prose | MoleculeType::Fragment => AtomizerStrategy::Prose,
            MoleculeType::Code => AtomizerStrategy::Code,
            MoleculeType::Data => AtomizerStrategy::Data,
        }
    }
}

/// A molecule boundary produced by the atomizer, before tagging/embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMolecule {
    pub start_byte: usize,
    pub end_byte: usize,
    pub molecule_type: MoleculeType,
}

/// Split `content` into molecules using the strategy implied by
/// `strategy_hint`. The returned ranges are non-overlapping, sorted
/// ascending, true UTF-8 byte offsets, and exactly cover `content` up to
/// trailing whitespace.
pub fn atomize(content: &str, strategy_hint: MoleculeType) -> Vec<RawMolecule> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    match AtomizerStrategy::from(strategy_hint) {
        AtomizerStrategy::Prose => atomize_prose(content),
        AtomizerStrategy::Code => atomize_code(content),
        AtomizerStrategy::Data => atomize_data(content),
    }
}

/// Paragraph-boundary split: a paragraph starts after a run of two or more
/// newlines (with only whitespace between them). Contiguous with no gaps —
/// each segment runs up to the start of the next.
fn paragraph_split_points(content: &str) -> Vec<usize> {
    let bytes = content.as_bytes();
    let mut points = vec![0usize];
    let mut newline_run = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                newline_run += 1;
                if newline_run == 2 {
                    // Next non-whitespace byte starts a new paragraph.
                    let mut j = i + 1;
                    while j < bytes.len() && (bytes[j] as char).is_whitespace() {
                        j += 1;
                    }
                    if j < bytes.len() && j != *points.last().unwrap() {
                        points.push(j);
                    }
                    newline_run = 0;
                }
            }
            b if !(b as char).is_whitespace() => newline_run = 0,
            _ => {}
        }
        i += 1;
    }
    points
}

fn segments_from_points(content: &str, mut points: Vec<usize>) -> Vec<(usize, usize)> {
    points.dedup();
    let mut segments = Vec::new();
    for window in points.windows(2) {
        segments.push((window[0], window[1]));
    }
    if let Some(&last) = points.last() {
        if last < content.len() {
            segments.push((last, content.len()));
        }
    }
    segments
}

fn merge_small_segments(content: &str, segments: Vec<(usize, usize)>, min_bytes: usize) -> Vec<(usize, usize)> {
    let mut merged = Vec::new();
    let mut acc_start: Option<usize> = None;
    let mut acc_end = 0usize;
    for (start, end) in segments {
        let start = if let Some(s) = acc_start { s } else { start };
        acc_start = Some(start);
        acc_end = end;
        if end - start >= min_bytes {
            merged.push((start, end));
            acc_start = None;
        }
    }
    if let Some(start) = acc_start {
        merged.push((start, acc_end));
    }
    let _ = content;
    merged
}

/// Split any segment exceeding `max_bytes` at the nearest preceding
/// whitespace byte, recursively.
fn split_oversized(content: &str, segments: Vec<(usize, usize)>, max_bytes: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for (start, end) in segments {
        let mut cursor = start;
        while end - cursor > max_bytes {
            let target = cursor + max_bytes;
            let mut split_at = target;
            while split_at > cursor && !content.is_char_boundary(split_at) {
                split_at -= 1;
            }
            // Walk back to the nearest whitespace so we don't sever a word.
            let mut candidate = split_at;
            while candidate > cursor && !content.as_bytes()[candidate - 1].is_ascii_whitespace() {
                candidate -= 1;
            }
            if candidate == cursor {
                candidate = split_at.max(cursor + 1);
                while candidate < end && !content.is_char_boundary(candidate) {
                    candidate += 1;
                }
            }
            out.push((cursor, candidate));
            cursor = candidate;
        }
        out.push((cursor, end));
    }
    out
}

fn atomize_prose(content: &str) -> Vec<RawMolecule> {
    let points = paragraph_split_points(content);
    let segments = segments_from_points(content, points);
    let merged = merge_small_segments(content, segments, MIN_PROSE_BYTES);
    let bounded = split_oversized(content, merged, MAX_PROSE_BYTES);
    bounded
        .into_iter()
        .filter(|(s, e)| e > s)
        .map(|(start_byte, end_byte)| RawMolecule {
            start_byte,
            end_byte,
            molecule_type: MoleculeType::Prose,
        })
        .collect()
}

/// Brace-balance block split: accumulate lines, tracking `{`/`}` depth;
/// flush a block when depth returns to zero. Falls back to size-bounded
/// line splits when the content never opens a brace (e.g. a single
/// top-level expression language).
fn atomize_code(content: &str) -> Vec<RawMolecule> {
    let mut saw_brace = false;
    let mut depth: i32 = 0;
    let mut segments = Vec::new();
    let mut block_start = 0usize;
    let mut line_start = 0usize;
    let mut lines_in_block = 0usize;

    for line in content.split_inclusive('\n') {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    saw_brace = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        lines_in_block += 1;
        let line_end = line_start + line.len();
        let block_len = line_end - block_start;
        if (depth <= 0 && lines_in_block > 0 && block_len >= 1)
            && (block_len >= MAX_CODE_BYTES || lines_in_block >= MAX_CODE_LINES || depth == 0 && saw_brace)
        {
            if depth <= 0 {
                segments.push((block_start, line_end));
                block_start = line_end;
                lines_in_block = 0;
                depth = 0;
            }
        }
        line_start = line_end;
    }
    if block_start < content.len() {
        segments.push((block_start, content.len()));
    }

    if !saw_brace {
        // No structural braces found: size-bounded line splits.
        segments = size_bounded_line_splits(content, MAX_CODE_BYTES);
    }

    segments
        .into_iter()
        .filter(|(s, e)| e > s)
        .map(|(start_byte, end_byte)| RawMolecule {
            start_byte,
            end_byte,
            molecule_type: MoleculeType::Code,
        })
        .collect()
}

fn size_bounded_line_splits(content: &str, max_bytes: usize) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut block_start = 0usize;
    let mut cursor = 0usize;
    for line in content.split_inclusive('\n') {
        let line_end = cursor + line.len();
        if line_end - block_start > max_bytes && line_end > block_start + line.len() {
            segments.push((block_start, cursor));
            block_start = cursor;
        }
        cursor = line_end;
    }
    if block_start < content.len() {
        segments.push((block_start, content.len()));
    }
    segments
}

/// Markdown/YAML block split via `pulldown-cmark`'s event stream: a new
/// segment starts at every top-level block-tag open. Malformed/unparseable
/// data (no block boundaries found) is treated as prose.
fn atomize_data(content: &str) -> Vec<RawMolecule> {
    let parser = Parser::new_ext(content, Options::empty()).into_offset_iter();
    let mut depth = 0i32;
    let mut starts = vec![0usize];

    for (event, range) in parser {
        match event {
            Event::Start(tag) if is_block_tag(&tag) => {
                if depth == 0 && range.start != 0 {
                    starts.push(range.start);
                }
                depth += 1;
            }
            Event::End(tag_end) if is_block_tag_end(&tag_end) => {
                depth = (depth - 1).max(0);
            }
            _ => {}
        }
    }

    if starts.len() <= 1 {
        // No block boundaries detected: malformed data, fall back to prose.
        return atomize_prose(content);
    }

    let segments = segments_from_points(content, starts);
    let merged = merge_small_segments(content, segments, MIN_PROSE_BYTES);
    merged
        .into_iter()
        .filter(|(s, e)| e > s)
        .map(|(start_byte, end_byte)| RawMolecule {
            start_byte,
            end_byte,
            molecule_type: MoleculeType::Data,
        })
        .collect()
}

fn is_block_tag(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Paragraph
            | Tag::Heading { .. }
            | Tag::CodeBlock(_)
            | Tag::List(_)
            | Tag::BlockQuote(_)
            | Tag::Table(_)
    )
}

fn is_block_tag_end(tag_end: &TagEnd) -> bool {
    matches!(
        tag_end,
        TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::CodeBlock
            | TagEnd::List(_)
            | TagEnd::BlockQuote(_)
            | TagEnd::Table
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(content: &str, molecules: &[RawMolecule]) {
        assert!(!molecules.is_empty(), "expected at least one molecule");
        let mut prev_end = molecules[0].start_byte;
        for m in molecules {
            assert_eq!(m.start_byte, prev_end, "gap or overlap detected");
            assert!(m.end_byte > m.start_byte);
            assert!(content.is_char_boundary(m.start_byte));
            assert!(content.is_char_boundary(m.end_byte));
            prev_end = m.end_byte;
        }
        assert!(prev_end <= content.len());
        assert!(content[prev_end..].trim().is_empty(), "uncovered trailing content");
    }

    #[test]
    fn prose_splits_on_paragraph_boundaries() {
        let content = "First paragraph with enough words to clear the minimum byte threshold for a standalone molecule.\n\nSecond paragraph, also long enough on its own to stand as a molecule without being merged upward.";
        let molecules = atomize(content, MoleculeType::Prose);
        assert_covers(content, &molecules);
        assert!(molecules.len() >= 2);
    }

    #[test]
    fn prose_merges_short_paragraphs() {
        let content = "Hi.\n\nOk.\n\nThis final paragraph is long enough by itself to exceed the minimum byte threshold on its own merits.";
        let molecules = atomize(content, MoleculeType::Prose);
        assert_covers(content, &molecules);
        // the two short paragraphs get folded into a following molecule
        assert!(molecules.iter().all(|m| m.end_byte - m.start_byte > 0));
    }

    #[test]
    fn prose_splits_oversized_molecules() {
        let content = "word ".repeat(1000);
        let molecules = atomize(&content, MoleculeType::Prose);
        assert_covers(&content, &molecules);
        assert!(molecules.len() > 1);
        assert!(molecules.iter().all(|m| m.end_byte - m.start_byte <= MAX_PROSE_BYTES + 32));
    }

    #[test]
    fn code_splits_on_balanced_braces() {
        let content = "fn a() {\n  1;\n}\nfn b() {\n  2;\n}\n";
        let molecules = atomize(content, MoleculeType::Code);
        assert_covers(content, &molecules);
        assert!(molecules.iter().all(|m| m.molecule_type == MoleculeType::Code));
    }

    #[test]
    fn code_without_braces_falls_back_to_line_splits() {
        let content = "x = 1\ny = 2\nz = 3\n".repeat(200);
        let molecules = atomize(&content, MoleculeType::Code);
        assert_covers(&content, &molecules);
    }

    #[test]
    fn data_splits_on_markdown_blocks() {
        let content = "# Heading\n\nSome paragraph text that is part of the data block under test.\n\n- item one\n- item two\n";
        let molecules = atomize(content, MoleculeType::Data);
        assert_covers(content, &molecules);
    }

    #[test]
    fn malformed_data_falls_back_to_prose() {
        let content = "just a run of plain words with no markdown block structure at all to speak of here";
        let molecules = atomize(content, MoleculeType::Data);
        assert_covers(content, &molecules);
    }

    #[test]
    fn empty_content_yields_no_molecules() {
        assert!(atomize("   \n\n  ", MoleculeType::Prose).is_empty());
    }

    #[test]
    fn multi_byte_characters_are_never_split() {
        let content = "héllo wörld, 日本語 text here to pad it out a little further than the minimum.\n\nA second paragraph with 漢字 and more characters to also clear the minimum size.";
        let molecules = atomize(content, MoleculeType::Prose);
        assert_covers(content, &molecules);
        for m in &molecules {
            assert!(content[m.start_byte..m.end_byte].chars().count() > 0);
        }
    }
}
