use std::collections::HashSet;

use super::Parish;

// Obvious non-parish entries: navigation chrome, chancery pages, widgets.
const SKIP_TERMS: &[&str] = &[
    "contact",
    "office",
    "directory",
    "finder",
    "search",
    "filter",
    "map",
    "diocese",
    "bishop",
    "center",
    "no parish registration",
];

const NAME_INDICATORS: &[&str] = &[
    "parish",
    "church",
    "st.",
    "saint",
    "our lady",
    "holy",
    "cathedral",
    "chapel",
    "basilica",
    "shrine",
];

/// A plausible parish name: at least 3 chars after trimming, no skip term,
/// and at least one parish indicator. Skip terms take precedence, so
/// "Parish Directory" is rejected even though it contains "parish".
pub fn is_plausible_name(name: &str) -> bool {
    let name = name.trim();
    if name.len() < 3 {
        return false;
    }
    let lower = name.to_lowercase();
    if SKIP_TERMS.iter().any(|term| lower.contains(term)) {
        return false;
    }
    NAME_INDICATORS.iter().any(|term| lower.contains(term))
}

/// Drop candidates with implausible names and collapse duplicates. Single
/// order-preserving pass: the first occurrence of each case-insensitive
/// trimmed name wins; later duplicates are discarded without field merging.
pub fn dedup(parishes: Vec<Parish>) -> Vec<Parish> {
    let mut seen: HashSet<String> = HashSet::new();
    parishes
        .into_iter()
        .filter(|parish| {
            is_plausible_name(&parish.name) && seen.insert(parish.name.trim().to_lowercase())
        })
        .collect()
}

// ── Tests ──
