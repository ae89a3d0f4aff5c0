//! Deterministic signatures for exact-duplicate bucketing.

use crate::models::PostingRecord;

/// Lowercases, turns every non-alphanumeric character into a space, and
/// collapses runs of whitespace.
pub fn normalize_field(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `(company, location)` key used to bucket near-duplicate candidates.
pub fn bucket_key(posting: &PostingRecord) -> (String, String) {
    (
        normalize_field(&posting.company),
        normalize_field(&posting.location),
    )
}

/// `company|location|title[|description prefix]`, all normalized.
///
/// The prefix is the first `prefix_chars` characters of the description (never
/// bytes); 0 leaves it out. Returns `None` when every component is empty, so
/// blank postings are never grouped together.
pub fn signature(posting: &PostingRecord, prefix_chars: usize) -> Option<String> {
    let mut parts = vec![
        normalize_field(&posting.company),
        normalize_field(&posting.location),
        normalize_field(&posting.title),
    ];
    if prefix_chars > 0 {
        let prefix: String = posting.description.chars().take(prefix_chars).collect();
        parts.push(normalize_field(&prefix));
    }

    if parts.iter().all(String::is_empty) {
        None
    } else {
        Some(parts.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(title: &str, company: &str, location: &str, description: &str) -> PostingRecord {
        PostingRecord::new("p", title, company, location, description)
    }

    #[test]
    fn test_normalize_field() {
        assert_eq!(normalize_field("  Sr. Data-Engineer (Remote) "), "sr data engineer remote");
        assert_eq!(normalize_field("Zürich,   CH"), "zürich ch");
        assert_eq!(normalize_field("---"), "");
    }

    #[test]
    fn test_signature_ignores_case_and_punctuation() {
        let a = posting("Data Engineer", "ACME Inc.", "Seattle, WA", "Build pipelines");
        let b = posting("data engineer", "acme inc", "seattle wa", "build   pipelines!");
        assert_eq!(signature(&a, 120), signature(&b, 120));
    }

    #[test]
    fn test_prefix_counts_characters() {
        let a = posting("Dev", "Acme", "Paris", "ééééé café un");
        let b = posting("Dev", "Acme", "Paris", "ééééé café deux");
        assert_eq!(signature(&a, 10), signature(&b, 10));
        assert_ne!(signature(&a, 13), signature(&b, 13));
        assert_eq!(signature(&a, 10).unwrap(), "acme|paris|dev|ééééé café");
    }

    #[test]
    fn test_zero_prefix_leaves_description_out() {
        let a = posting("Dev", "Acme", "Paris", "one");
        let b = posting("Dev", "Acme", "Paris", "two");
        assert_eq!(signature(&a, 0), signature(&b, 0));
        assert_eq!(signature(&a, 0).unwrap(), "acme|paris|dev");
    }

    #[test]
    fn test_blank_posting_has_no_signature() {
        assert_eq!(signature(&posting(" ", "", "--", ""), 120), None);
    }
}
