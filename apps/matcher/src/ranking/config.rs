//! Aggregate weights and decision thresholds.
//!
//! Loaded from a JSON file named by `MATCHER_RANKING_FILE`, or the defaults
//! below when the variable is unset. Every problem is reported in one
//! `ConfigValidation` error.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::MatchError;

/// Upper bound for any single component weight.
pub const MAX_COMPONENT_WEIGHT: f64 = 1.5;
const WEIGHT_SUM_MIN: f64 = 0.8;
const WEIGHT_SUM_MAX: f64 = 1.5;

/// Multipliers for each ranking component. All must be present in a file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateWeights {
    pub skill: f64,
    pub semantic: f64,
    pub recency: f64,
    pub seniority: f64,
    pub company: f64,
}

impl Default for AggregateWeights {
    fn default() -> Self {
        Self {
            skill: 0.55,
            semantic: 0.15,
            recency: 0.15,
            seniority: 0.10,
            company: 0.05,
        }
    }
}

impl AggregateWeights {
    fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("skill", self.skill),
            ("semantic", self.semantic),
            ("recency", self.recency),
            ("seniority", self.seniority),
            ("company", self.company),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.entries().iter().map(|(_, w)| w).sum()
    }
}

/// `0 <= review < shortlist <= 1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub shortlist: f64,
    pub review: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            shortlist: 0.7,
            review: 0.5,
        }
    }
}

fn default_target_seniority() -> Vec<String> {
    vec!["Associate".to_string(), "Mid-Senior".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    pub weights: AggregateWeights,
    pub thresholds: Thresholds,
    /// Seniority labels that carry no penalty. Compared case-insensitively.
    #[serde(default = "default_target_seniority")]
    pub target_seniority: Vec<String>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: AggregateWeights::default(),
            thresholds: Thresholds::default(),
            target_seniority: default_target_seniority(),
        }
    }
}

impl RankingConfig {
    /// Reads `MATCHER_RANKING_FILE` when set; defaults otherwise.
    pub fn from_env() -> Result<Self, MatchError> {
        match std::env::var("MATCHER_RANKING_FILE") {
            Ok(path) => Self::load(Path::new(path.trim())),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parses and validates a ranking file. A missing file is a configuration
    /// error, not a fallback to defaults.
    pub fn load(path: &Path) -> Result<Self, MatchError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MatchError::ConfigValidation(format!("ranking file {} unreadable: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            MatchError::ConfigValidation(format!("ranking file {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        let mut problems = Vec::new();

        for (name, weight) in self.weights.entries() {
            if !weight.is_finite() || weight <= 0.0 {
                problems.push(format!("weight '{name}' must be > 0"));
            } else if weight > MAX_COMPONENT_WEIGHT {
                problems.push(format!("weight '{name}' too large (> {MAX_COMPONENT_WEIGHT})"));
            }
        }
        let total = self.weights.sum();
        if !(WEIGHT_SUM_MIN..=WEIGHT_SUM_MAX).contains(&total) {
            problems.push(format!(
                "weights sum {total:.3} outside [{WEIGHT_SUM_MIN},{WEIGHT_SUM_MAX}]"
            ));
        }

        let Thresholds { shortlist, review } = self.thresholds;
        if !(0.0 <= review && review < shortlist && shortlist <= 1.0) {
            problems.push("thresholds must satisfy 0 <= review < shortlist <= 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MatchError::ConfigValidation(problems.join("; ")))
        }
    }
}
