use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::MatchError;

/// Upper bound on extraction workers. Beyond ~4 the returns diminish.
pub const MAX_WORKERS_LIMIT: usize = 8;

/// Tuning knobs consumed by the matching core.
/// Every field is validated by `validate()` before any posting is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub similarity_threshold: f64,
    pub max_new_semantic: usize,
    pub enable_bigrams: bool,
    /// Default for the semantic toggle; env overrides are resolved by `semantic_enabled`.
    pub enable_semantic: bool,
    pub enable_similarity_dedupe: bool,
    /// 0 – 100
    pub title_fuzzy_min: u8,
    /// 0.0 – 1.0
    pub jaccard_min: f64,
    /// Counted in characters, not bytes. 0 disables the prefix component.
    pub description_prefix_length: usize,
    pub extraction_cache_version: u32,
    pub max_workers: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.32,
            max_new_semantic: 15,
            enable_bigrams: true,
            enable_semantic: true,
            enable_similarity_dedupe: true,
            title_fuzzy_min: 90,
            jaccard_min: 0.82,
            description_prefix_length: 120,
            extraction_cache_version: 1,
            max_workers: 1,
        }
    }
}

impl MatchConfig {
    /// Loads `MATCHER_*` overrides on top of the defaults, then validates.
    pub fn from_env() -> Result<Self, MatchError> {
        dotenvy::dotenv().ok();

        let d = Self::default();
        let config = Self {
            similarity_threshold: env_or("MATCHER_SIMILARITY_THRESHOLD", d.similarity_threshold)?,
            max_new_semantic: env_or("MATCHER_MAX_NEW_SEMANTIC", d.max_new_semantic)?,
            enable_bigrams: env_flag_or("MATCHER_ENABLE_BIGRAMS", d.enable_bigrams)?,
            enable_semantic: env_flag_or("MATCHER_ENABLE_SEMANTIC", d.enable_semantic)?,
            enable_similarity_dedupe: env_flag_or(
                "MATCHER_ENABLE_SIMILARITY_DEDUPE",
                d.enable_similarity_dedupe,
            )?,
            title_fuzzy_min: env_or("MATCHER_TITLE_FUZZY_MIN", d.title_fuzzy_min)?,
            jaccard_min: env_or("MATCHER_JACCARD_MIN", d.jaccard_min)?,
            description_prefix_length: env_or(
                "MATCHER_DESCRIPTION_PREFIX_LENGTH",
                d.description_prefix_length,
            )?,
            extraction_cache_version: env_or(
                "MATCHER_EXTRACTION_CACHE_VERSION",
                d.extraction_cache_version,
            )?,
            max_workers: env_or("MATCHER_MAX_WORKERS", d.max_workers)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects out-of-range values. Collects every problem into one message.
    pub fn validate(&self) -> Result<(), MatchError> {
        let mut problems = Vec::new();

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            problems.push(format!(
                "similarity_threshold {} outside [0,1]",
                self.similarity_threshold
            ));
        }
        if self.title_fuzzy_min > 100 {
            problems.push(format!(
                "title_fuzzy_min {} outside [0,100]",
                self.title_fuzzy_min
            ));
        }
        if !(0.0..=1.0).contains(&self.jaccard_min) {
            problems.push(format!("jaccard_min {} outside [0,1]", self.jaccard_min));
        }
        if self.max_workers == 0 || self.max_workers > MAX_WORKERS_LIMIT {
            problems.push(format!(
                "max_workers {} outside [1,{MAX_WORKERS_LIMIT}]",
                self.max_workers
            ));
        }
        if self.extraction_cache_version == 0 {
            problems.push("extraction_cache_version must be >= 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MatchError::ConfigValidation(problems.join("; ")))
        }
    }
}

/// Resolves whether the semantic layer runs for this invocation.
///
/// Precedence (highest wins): explicit override, `MATCHER_NO_SEMANTIC=1`,
/// `MATCHER_SEMANTIC_ENABLE`, then the configured default.
pub fn semantic_enabled(config: &MatchConfig, override_flag: Option<bool>) -> bool {
    resolve_semantic_toggle(
        override_flag,
        std::env::var("MATCHER_NO_SEMANTIC").ok().as_deref(),
        std::env::var("MATCHER_SEMANTIC_ENABLE").ok().as_deref(),
        config.enable_semantic,
    )
}

fn resolve_semantic_toggle(
    override_flag: Option<bool>,
    no_semantic: Option<&str>,
    semantic_enable: Option<&str>,
    default: bool,
) -> bool {
    if let Some(flag) = override_flag {
        return flag;
    }
    if no_semantic.map(str::trim) == Some("1") {
        return false;
    }
    match semantic_enable.and_then(parse_flag) {
        Some(flag) => flag,
        None => default,
    }
}

/// Runtime settings for the batch runner binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub resume_path: PathBuf,
    pub seed_skills_path: PathBuf,
    pub postings_path: PathBuf,
    pub output_path: PathBuf,
    pub assignments_path: PathBuf,
    pub cache_dir: PathBuf,
    pub rebuild_profile: bool,
    pub clear_skill_cache: bool,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            resume_path: require_env("MATCHER_RESUME_PATH")?.into(),
            seed_skills_path: require_env("MATCHER_SEED_SKILLS_PATH")?.into(),
            postings_path: require_env("MATCHER_POSTINGS_PATH")?.into(),
            output_path: std::env::var("MATCHER_OUTPUT_PATH")
                .unwrap_or_else(|_| "scored_postings.jsonl".to_string())
                .into(),
            assignments_path: std::env::var("MATCHER_ASSIGNMENTS_PATH")
                .unwrap_or_else(|_| "dedupe_assignments.json".to_string())
                .into(),
            cache_dir: std::env::var("MATCHER_CACHE_DIR")
                .unwrap_or_else(|_| ".matcher-cache".to_string())
                .into(),
            rebuild_profile: std::env::var("MATCHER_REBUILD_PROFILE")
                .map(|v| v.trim() == "1")
                .unwrap_or(false),
            clear_skill_cache: std::env::var("MATCHER_CLEAR_SKILL_CACHE")
                .map(|v| v.trim() == "1")
                .unwrap_or(false),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, MatchError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            MatchError::ConfigValidation(format!("{key}='{raw}' could not be parsed"))
        }),
        Err(_) => Ok(default),
    }
}

fn env_flag_or(key: &str, default: bool) -> Result<bool, MatchError> {
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw).ok_or_else(|| {
            MatchError::ConfigValidation(format!("{key}='{raw}' is not a boolean flag"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(MatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_jaccard_out_of_range_rejected() {
        let config = MatchConfig {
            jaccard_min: 1.2,
            ..MatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MatchError::ConfigValidation(_)));
        assert!(err.to_string().contains("jaccard_min"));
    }

    #[test]
    fn test_multiple_problems_reported_together() {
        let config = MatchConfig {
            similarity_threshold: -0.1,
            title_fuzzy_min: 101,
            max_workers: 0,
            ..MatchConfig::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("similarity_threshold"));
        assert!(msg.contains("title_fuzzy_min"));
        assert!(msg.contains("max_workers"));
    }

    #[test]
    fn test_worker_bound_enforced() {
        let config = MatchConfig {
            max_workers: MAX_WORKERS_LIMIT + 1,
            ..MatchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cache_version_rejected() {
        let config = MatchConfig {
            extraction_cache_version: 0,
            ..MatchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_flag_variants() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_semantic_override_wins() {
        assert!(resolve_semantic_toggle(Some(true), Some("1"), Some("0"), false));
        assert!(!resolve_semantic_toggle(Some(false), None, Some("1"), true));
    }

    #[test]
    fn test_no_semantic_env_beats_enable_env() {
        assert!(!resolve_semantic_toggle(None, Some("1"), Some("1"), true));
    }

    #[test]
    fn test_semantic_enable_env_then_default() {
        assert!(!resolve_semantic_toggle(None, None, Some("false"), true));
        assert!(resolve_semantic_toggle(None, None, Some("1"), false));
        assert!(resolve_semantic_toggle(None, None, Some("garbage"), true));
        assert!(!resolve_semantic_toggle(None, None, None, false));
    }

    #[test]
    fn test_config_deserializes_with_partial_fields() {
        let config: MatchConfig = serde_json::from_str(r#"{"jaccard_min": 0.9}"#).unwrap();
        assert!((config.jaccard_min - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.title_fuzzy_min, 90);
    }
}
