use once_cell::sync::Lazy;
use regex::Regex;

static HOMOGRAPH_NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+I{1,3}$").expect("valid numeral regex"));

static OPTIONAL_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)\(([^)]+)\)(.*)$").expect("valid parenthesis regex"));

static LEADING_DETERMINERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:sich\s+)?(?:(?:ein(?:e|en|em|es)?|der|die|das|dem|den|des|sein(?:e|en|em|es)?|ihr(?:e|en|em|es)?|mein(?:e|en|em|es)?|dein(?:e|en|em|es)?|unser(?:e|en|em|es)?|euer(?:e|en|em|es)?)\s+)*",
    )
    .expect("valid determiner regex")
});

/// Expand a headword field into the spelling variants it stands for.
///
/// The field may list several forms separated by `,` or `;`. Homograph
/// numerals (`Bier II`) are dropped, truncated compounds are completed from
/// their neighbour (`Bampel-, Bämpeles-wirtschaft`,
/// `Holderblüten-tee, Holunderblüten-`, `Schoppen-glas, -krug`), hyphens are
/// removed and an optional parenthesised part yields both readings
/// (`Schnap(p)s` → `Schnapps`, `Schnaps`). Order follows the field, without
/// repeats.
pub fn headword_variants(field: &str) -> Vec<String> {
    let parts: Vec<&str> = field
        .split([',', ';'])
        .map(|p| strip_homograph_numeral(p.trim()))
        .filter(|p| !p.is_empty())
        .collect();

    let mut out = Vec::new();
    let mut idx = 0;
    while idx < parts.len() {
        let current = parts[idx];
        let next = parts.get(idx + 1).copied();
        let prev = idx.checked_sub(1).map(|p| parts[p]);

        match (current.strip_suffix('-'), current.strip_prefix('-')) {
            (Some(stem), _) if next.is_some() => {
                let next = next.unwrap_or_default();
                let tail = next.split_once('-').map_or(next, |(_, tail)| tail);
                push_expanded(&mut out, &format!("{stem}{tail}").replace('-', ""));
                push_expanded(&mut out, &next.replace('-', ""));
                idx += 2;
            }
            (Some(stem), _) if prev.is_some() => {
                if let Some((_, tail)) = prev.unwrap_or_default().split_once('-') {
                    push_expanded(&mut out, &format!("{stem}{tail}").replace('-', ""));
                }
                idx += 1;
            }
            (None, Some(rest)) if prev.is_some() => {
                let base = prev.unwrap_or_default().split('-').next().unwrap_or("").trim();
                push_expanded(&mut out, &format!("{base}{rest}").replace('-', ""));
                idx += 1;
            }
            _ => {
                push_expanded(&mut out, &current.replace('-', ""));
                idx += 1;
            }
        }
    }
    out
}

/// Remove a leading reflexive `sich` and any run of articles or possessive
/// determiners from a vocabulary term.
///
/// Returns `None` when nothing was removed or nothing would remain.
pub fn strip_leading_determiners(term: &str) -> Option<&str> {
    let trimmed = term.trim();
    let end = LEADING_DETERMINERS.find(trimmed).map_or(0, |m| m.end());
    if end == 0 {
        return None;
    }
    let rest = trimmed[end..].trim();
    if rest.is_empty() { None } else { Some(rest) }
}

fn strip_homograph_numeral(word: &str) -> &str {
    match HOMOGRAPH_NUMERAL.find(word) {
        Some(m) => word[..m.start()].trim_end(),
        None => word,
    }
}

fn push_expanded(out: &mut Vec<String>, word: &str) {
    let expanded = match OPTIONAL_PART.captures(word) {
        Some(caps) => {
            let (prefix, optional, suffix) = (&caps[1], &caps[2], &caps[3]);
            vec![format!("{prefix}{optional}{suffix}"), format!("{prefix}{suffix}")]
        }
        None => vec![word.to_string()],
    };
    for variant in expanded {
        let variant = variant.trim().to_string();
        if !variant.is_empty() && !out.contains(&variant) {
            out.push(variant);
        }
    }
}
