//! Near-duplicate measures: a partial fuzzy title ratio and description token Jaccard.

use std::collections::HashSet;

use crate::dedup::signature::normalize_field;

/// Fuzzy title similarity, 0 – 100.
///
/// The shorter lowercased title is slid over every equally long character window
/// of the longer one and the best normalized Levenshtein similarity is kept, so
/// a title contained in another scores 100.
pub fn title_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.trim().to_lowercase().chars().collect();
    let b: Vec<char> = b.trim().to_lowercase().chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let short: String = short.into_iter().collect();

    let best = long
        .windows(short.chars().count())
        .map(|w| strsim::normalized_levenshtein(&short, &w.iter().collect::<String>()))
        .fold(0.0_f64, f64::max);

    (best * 100.0).round().clamp(0.0, 100.0) as u8
}

fn token_set(text: &str) -> HashSet<String> {
    normalize_field(text)
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// `|A ∩ B| / |A ∪ B|` over normalized description tokens; 0 when either side is empty.
pub fn description_jaccard(a: &str, b: &str) -> f64 {
    jaccard(&token_set(a), &token_set(b))
}

pub(crate) fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    if inter == 0 {
        return 0.0;
    }
    inter as f64 / a.union(b).count() as f64
}

pub(crate) fn description_tokens(text: &str) -> HashSet<String> {
    token_set(text)
}
