use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Canonical comparison form of a string.
///
/// Decodes HTML entities, lowercases, strips diacritics (NFKD minus
/// combining marks), folds `ß` to `ss`, joins words split by hyphens or
/// apostrophes, turns remaining punctuation into spaces and collapses
/// whitespace. The result contains only lowercase alphanumerics separated by
/// single spaces, which makes the function idempotent.
pub fn normalize(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);

    let mut folded = String::with_capacity(decoded.len());
    for c in decoded.chars().flat_map(char::to_lowercase).nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        // NFKD can surface uppercase compatibility forms (e.g. `ℌ`).
        for lower in c.to_lowercase() {
            match lower {
                'ß' => folded.push_str("ss"),
                other => folded.push(other),
            }
        }
    }

    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;
    for c in folded.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else if !is_word_joiner(c) {
            pending_space = true;
        }
    }
    out
}

/// Number of whitespace-separated tokens in an already normalized string.
pub fn token_count(normalized: &str) -> usize {
    normalized.split_whitespace().count()
}

pub fn is_single_token(normalized: &str) -> bool {
    token_count(normalized) == 1
}

// Characters that glue compound parts together and vanish without leaving a
// word boundary.
fn is_word_joiner(c: char) -> bool {
    matches!(
        c,
        '-' | '\u{00AD}' | '\u{2010}' | '\u{2011}' | '\'' | '\u{2019}'
    )
}
