//! Sanitizer: the pure text-normalization pass every other component builds on.

/// Literal substrings stripped after unescaping/codepoint filtering.
const STRIP_LITERALS: [&str; 2] = ["[Truncated]", "[...]"];

/// Normalize raw text before any downstream processing (atomizing,
/// fingerprinting, tagging). Pure, allocation-light, no I/O.
///
/// Operations, in order:
/// 1. Unescape `\n`, `\t`, `\"`, `\\` literal escape sequences; drop `\r`.
/// 2. Drop codepoints in the decorative/emoji ranges used by chat exports.
/// 3. Remove literal placeholder substrings left by truncated exports.
///
/// Idempotent: running `sanitize` on its own output returns the same string.
pub fn sanitize(input: &str) -> String {
    let unescaped = unescape(input);
    let filtered = drop_decorative_codepoints(&unescaped);
    strip_literals(&filtered)
}

fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {}
            '\\' => match chars.peek() {
                Some('n') => {
                    out.push('\n');
                    chars.next();
                }
                Some('t') => {
                    out.push('\t');
                    chars.next();
                }
                Some('"') => {
                    out.push('"');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

/// True if `c` falls in one of the decorative/box-drawing/emoji ranges that
/// chat exports litter prose with (box drawing, dingbats, misc symbols,
/// emoji, plus the standalone star/check/cross marks).
fn is_decorative(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x2500..=0x259F
        | 0x25A0..=0x27BF
        | 0x1F300..=0x1F9FF
    ) || matches!(c, '\u{2B50}' | '\u{2713}' | '\u{2714}' | '\u{274C}' | '\u{274E}')
}

fn drop_decorative_codepoints(input: &str) -> String {
    input.chars().filter(|c| !is_decorative(*c)).collect()
}

fn strip_literals(input: &str) -> String {
    let mut out = input.to_string();
    for literal in STRIP_LITERALS {
        out = out.replace(literal, "");
    }
    out
}
