//! Heuristic skill extraction: case-insensitive, token-boundary matching of seed
//! phrases against a description, reported in order of first appearance.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::MatchError;

/// Spelling variants folded onto one form before matching.
const SYNONYMS: &[(&str, &str)] = &[
    ("k8s", "kubernetes"),
    ("e-mail", "email"),
    ("infra", "infrastructure"),
    ("programme", "program"),
];

static SYNONYM_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives: Vec<String> = SYNONYMS.iter().map(|(from, _)| regex::escape(from)).collect();
    Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).expect("synonym pattern is valid")
});

/// Lowercases, folds synonyms, and collapses whitespace.
fn normalize_for_matching(text: &str) -> String {
    let lower = text.to_lowercase();
    let folded = SYNONYM_RE.replace_all(&lower, |caps: &regex::Captures<'_>| {
        let found = &caps[0];
        SYNONYMS
            .iter()
            .find(|(from, _)| *from == found)
            .map(|(_, to)| (*to).to_string())
            .unwrap_or_else(|| found.to_string())
    });
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte offset of the first token-bounded occurrence of `phrase` in `text`.
///
/// After a rejected occurrence the search resumes one character later, so a
/// bounded occurrence overlapping an unbounded one is still found.
fn first_bounded_match(text: &str, phrase: &str) -> Option<usize> {
    let mut start = 0;
    while let Some(offset) = text[start..].find(phrase) {
        let pos = start + offset;
        let before_ok = text[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[pos + phrase.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(pos);
        }
        start = pos + text[pos..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Returns the seed skills mentioned in `description`, ordered by first
/// appearance (seed order breaks ties), spelled as in `seed_skills`.
///
/// Output is always a subset of `seed_skills`. Case-insensitive repeats in the
/// seed list are ignored after their first entry.
pub fn extract_skills(description: &str, seed_skills: &[String]) -> Vec<String> {
    if description.trim().is_empty() || seed_skills.is_empty() {
        return Vec::new();
    }

    let text = normalize_for_matching(description);
    let mut seen = HashSet::new();
    let mut found: Vec<(usize, usize, &String)> = Vec::new();

    for (seed_idx, seed) in seed_skills.iter().enumerate() {
        let key = seed.trim().to_lowercase();
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        let phrase = normalize_for_matching(seed);
        if phrase.is_empty() {
            continue;
        }
        if let Some(pos) = first_bounded_match(&text, &phrase) {
            found.push((pos, seed_idx, seed));
        }
    }

    found.sort_by_key(|&(pos, seed_idx, _)| (pos, seed_idx));
    found.into_iter().map(|(_, _, seed)| seed.clone()).collect()
}

/// Reads a newline-delimited seed skill list. Blank lines are skipped.
/// A missing file yields an empty vocabulary.
pub fn load_seed_skills(path: &Path) -> Result<Vec<String>, MatchError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}
