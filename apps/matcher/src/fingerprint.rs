//! Content fingerprints used as cache keys.
//!
//! SHA-256 over length-prefixed parts, hex encoded. Length prefixes keep
//! `("ab", "c")` and `("a", "bc")` from colliding.

use sha2::{Digest, Sha256};

/// Fingerprint over an ordered list of parts.
pub fn fingerprint_parts<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

/// Collapses whitespace runs and trims, so formatting-only edits share a key.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fingerprint of a seed skill vocabulary. Order matters: it drives tie-breaks.
pub fn vocabulary_fingerprint(seed_skills: &[String]) -> String {
    fingerprint_parts(seed_skills.iter().map(|s| s.as_bytes()))
}

/// Key for one posting's extraction entry.
pub fn description_fingerprint(description: &str, extraction_version: u32) -> String {
    let normalized = normalize_text(description);
    fingerprint_parts([
        normalized.as_bytes(),
        extraction_version.to_string().as_bytes(),
    ])
}

/// Key for the resume profile: resume content plus the seed list it was merged with.
pub fn profile_fingerprint(resume_content: &str, seed_skills: &[String]) -> String {
    fingerprint_parts([
        resume_content.as_bytes(),
        vocabulary_fingerprint(seed_skills).as_bytes(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint_parts(["abc"]);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_part_boundaries_matter() {
        assert_ne!(fingerprint_parts(["ab", "c"]), fingerprint_parts(["a", "bc"]));
    }

    #[test]
    fn test_whitespace_only_edits_share_key() {
        assert_eq!(
            description_fingerprint("Rust  and\n\tGo ", 1),
            description_fingerprint("Rust and Go", 1)
        );
    }

    #[test]
    fn test_version_changes_key() {
        assert_ne!(
            description_fingerprint("Rust", 1),
            description_fingerprint("Rust", 2)
        );
    }

    #[test]
    fn test_profile_key_depends_on_seeds() {
        let a = profile_fingerprint("resume", &["Rust".to_string()]);
        let b = profile_fingerprint("resume", &["Rust".to_string(), "Go".to_string()]);
        assert_ne!(a, b);
    }
}
