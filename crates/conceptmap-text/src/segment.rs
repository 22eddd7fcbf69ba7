use conceptmap_types::CandidateDefinition;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::normalize;

/// Words that open a relative clause; a comma directly before one of them
/// does not separate two senses.
pub const RELATIVE_PRONOUNS: [&str; 10] = [
    "der", "die", "das", "welcher", "welche", "welches", "dem", "den", "dessen", "deren",
];

// `1.`, `2)`, `12.` at the start of the field or after whitespace/semicolon.
static SENSE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s;])\d{1,2}[.)](?:\s+|$)").expect("valid sense regex"));

/// Split a raw definition field into its raw sense fragments.
///
/// Splits on numbered senses, then semicolons, then commas that do not
/// introduce a relative clause. Fragments are trimmed; empty ones are
/// dropped. No normalization happens here.
pub fn split_senses(definition: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for numbered in SENSE_NUMBER.split(definition) {
        for part in numbered.split(';') {
            for fragment in split_at_commas(part) {
                let fragment = fragment.trim();
                if !fragment.is_empty() {
                    out.push(fragment);
                }
            }
        }
    }
    out
}

/// Cut a definition into normalized candidates owned by entry `entry`.
///
/// HTML entities are decoded before splitting, so `&auml;` never reads as a
/// sense boundary. Parentheses are removed but their content is kept. Fragments that
/// normalize to the empty string are dropped, as are repeats of an earlier
/// fragment of the same entry. An empty return value means the entry has no
/// usable definition.
pub fn segment_definition(entry: usize, definition: &str) -> Vec<CandidateDefinition> {
    let decoded = html_escape::decode_html_entities(definition);
    let mut candidates: Vec<CandidateDefinition> = Vec::new();
    for raw in split_senses(&decoded) {
        let unbracketed: String = raw.chars().filter(|c| !matches!(c, '(' | ')')).collect();
        let normalized = normalize(&unbracketed);
        if normalized.is_empty() || candidates.iter().any(|c| c.normalized == normalized) {
            continue;
        }
        candidates.push(CandidateDefinition {
            entry,
            ordinal: candidates.len(),
            raw: raw.to_string(),
            normalized,
        });
    }
    candidates
}

fn split_at_commas(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(',') {
        let before = &text[..idx];
        let after = &text[idx + 1..];
        if opens_relative_clause(after) || is_decimal_comma(before, after) {
            continue;
        }
        parts.push(&text[start..idx]);
        start = idx + 1;
    }
    parts.push(&text[start..]);
    parts
}

fn opens_relative_clause(rest: &str) -> bool {
    rest.split_whitespace()
        .next()
        .map(|word| {
            let word = word.to_lowercase();
            RELATIVE_PRONOUNS.contains(&word.as_str())
        })
        .unwrap_or(false)
}

fn is_decimal_comma(before: &str, after: &str) -> bool {
    let digit_before = before.chars().next_back().is_some_and(|c| c.is_ascii_digit());
    let digit_after = after.chars().next().is_some_and(|c| c.is_ascii_digit());
    digit_before && digit_after
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(definition: &str) -> Vec<String> {
        segment_definition(7, definition)
            .into_iter()
            .map(|c| c.normalized)
            .collect()
    }

    #[test]
    fn splits_semicolons_and_commas() {
        assert_eq!(
            normalized("Schnaps; Branntwein, Fusel"),
            ["schnaps", "branntwein", "fusel"]
        );
    }

    #[test]
    fn keeps_relative_clauses_together() {
        assert_eq!(
            normalized("Mensch, der viel trinkt; Säufer"),
            ["mensch der viel trinkt", "saufer"]
        );
        assert_eq!(
            normalized("Gefäß, Welches man füllt"),
            ["gefass welches man fullt"]
        );
    }

    #[test]
    fn splits_numbered_senses() {
        assert_eq!(
            normalized("1. saufen 2) zechen; 3. trinken"),
            ["saufen", "zechen", "trinken"]
        );
    }

    #[test]
    fn does_not_split_decimal_numbers() {
        assert_eq!(split_senses("Maß von 0,5 l, Schoppen"), ["Maß von 0,5 l", "Schoppen"]);
    }

    #[test]
    fn drops_empty_and_repeated_fragments() {
        let cands = segment_definition(3, " ; (…) ; Bier, bier ;");
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].normalized, "bier");
        assert_eq!(cands[0].raw, "Bier");
        assert_eq!(cands[0].entry, 3);
        assert_eq!(cands[0].ordinal, 0);
        assert!(segment_definition(0, "").is_empty());
        assert!(segment_definition(0, "&nbsp;--").is_empty());
    }

    #[test]
    fn entities_do_not_split_senses() {
        assert_eq!(normalized("Gef&#228;&#223;"), ["gefass"]);
        assert_eq!(normalized("Schn&auml;pse trinken"), ["schnapse trinken"]);
        assert_eq!(normalized("Wein &amp; Bier; Most"), ["wein bier", "most"]);
        assert_eq!(segment_definition(0, "Gef&#228;&#223;")[0].raw, "Gefäß");
    }

    #[test]
    fn ordinals_follow_kept_fragments() {
        let cands = segment_definition(0, "a; ; b");
        let ordinals: Vec<_> = cands.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, [0, 1]);
    }
}
