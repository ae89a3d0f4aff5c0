//! Final ranking of a scored posting.
//!
//! `total = Σ weight_c · component_c` over skill, semantic, recency, seniority
//! and company, rounded to four decimals. The total is then compared with the
//! shortlist and review thresholds.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::matching::{ScoreResult, SimilarityBackend, TfIdfSimilarity};
use crate::models::{PostingRecord, ResumeProfile};
use crate::ranking::config::{RankingConfig, Thresholds};

/// Recency of a posting with no date.
pub const UNDATED_RECENCY: f64 = 0.3;
pub const RECENCY_DECAY_PER_DAY: f64 = 0.25;
pub const SENIORITY_MISMATCH_PENALTY: f64 = 0.25;

/// `exp(-0.25 · days)` since `posted_at`. Future dates count as today.
pub fn recency_score(posted_at: Option<NaiveDate>, today: NaiveDate) -> f64 {
    match posted_at {
        None => UNDATED_RECENCY,
        Some(date) => {
            let days = (today - date).num_days().max(0);
            (-RECENCY_DECAY_PER_DAY * days as f64).exp()
        }
    }
}

/// Fixed penalty when the posting names a seniority outside `targets`.
/// An unlabelled posting is not penalised.
pub fn seniority_penalty(level: Option<&str>, targets: &[String]) -> f64 {
    let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) else {
        return 0.0;
    };
    if targets.iter().any(|t| t.trim().eq_ignore_ascii_case(level)) {
        0.0
    } else {
        SENIORITY_MISMATCH_PENALTY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStatus {
    Shortlisted,
    Review,
    New,
}

impl RankStatus {
    /// Both thresholds are inclusive.
    pub fn classify(total: f64, thresholds: &Thresholds) -> Self {
        if total >= thresholds.shortlist {
            RankStatus::Shortlisted
        } else if total >= thresholds.review {
            RankStatus::Review
        } else {
            RankStatus::New
        }
    }
}

/// Unweighted component values, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankBreakdown {
    pub skill: f64,
    pub semantic: f64,
    pub recency: f64,
    /// `1 - seniority_penalty`
    pub seniority_component: f64,
    /// No company signal is collected yet, so this is always 0.
    pub company: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub total: f64,
    pub status: RankStatus,
    pub breakdown: RankBreakdown,
}

// ────────────────────────────────────────────────────────────────────────────
// Ranker
// ────────────────────────────────────────────────────────────────────────────

pub struct Ranker {
    config: RankingConfig,
    similarity: Arc<dyn SimilarityBackend>,
}

impl Ranker {
    pub fn new(config: RankingConfig) -> Self {
        Self::with_backend(config, Arc::new(TfIdfSimilarity))
    }

    pub fn with_backend(config: RankingConfig, similarity: Arc<dyn SimilarityBackend>) -> Self {
        Self { config, similarity }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Best similarity between the description and any resume context phrase.
    /// 0 when either side is empty or the backend fails.
    pub fn semantic_score(&self, profile: &ResumeProfile, description: &str) -> f64 {
        let phrases = profile.context_phrases();
        if phrases.is_empty() || description.trim().is_empty() {
            return 0.0;
        }
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.similarity.similarities(description, &phrases, false)
        }));
        match result {
            Ok(Ok(similarities)) => similarities
                .into_iter()
                .filter(|s| s.is_finite())
                .fold(0.0_f64, f64::max)
                .clamp(0.0, 1.0),
            Ok(Err(e)) => {
                debug!("Semantic component unavailable: {e}");
                0.0
            }
            Err(_) => {
                warn!("Similarity backend {} panicked while ranking", self.similarity.name());
                0.0
            }
        }
    }

    pub fn rank(
        &self,
        posting: &PostingRecord,
        score: &ScoreResult,
        profile: &ResumeProfile,
        today: NaiveDate,
    ) -> Ranking {
        let breakdown = RankBreakdown {
            skill: score.skill_score,
            semantic: self.semantic_score(profile, &posting.description),
            recency: recency_score(posting.posted_at, today),
            seniority_component: 1.0
                - seniority_penalty(
                    posting.seniority_level.as_deref(),
                    &self.config.target_seniority,
                ),
            company: 0.0,
        };

        let w = &self.config.weights;
        let total = w.skill * breakdown.skill
            + w.semantic * breakdown.semantic
            + w.recency * breakdown.recency
            + w.seniority * breakdown.seniority_component
            + w.company * breakdown.company;
        let total = (total * 10_000.0).round() / 10_000.0;

        Ranking {
            total,
            status: RankStatus::classify(total, &self.config.thresholds),
            breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EnrichmentError;
    use crate::ranking::config::AggregateWeights;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn score(skill_score: f64) -> ScoreResult {
        ScoreResult {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            breadth_bonus: 0.0,
            skill_score,
            overlap: Vec::new(),
            overlap_count: 0,
            core_size: 0,
        }
    }

    struct FixedSimilarity(f64);

    impl SimilarityBackend for FixedSimilarity {
        fn similarities(
            &self,
            _: &str,
            phrases: &[String],
            _: bool,
        ) -> Result<Vec<f64>, EnrichmentError> {
            Ok(vec![self.0; phrases.len()])
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct FailingSimilarity;

    impl SimilarityBackend for FailingSimilarity {
        fn similarities(
            &self,
            _: &str,
            _: &[String],
            _: bool,
        ) -> Result<Vec<f64>, EnrichmentError> {
            Err(EnrichmentError::EmptyVectorSpace)
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn profile_with_summary() -> ResumeProfile {
        ResumeProfile::new("fp".to_string(), vec!["Rust".to_string()])
            .with_context("Backend engineer building Rust services".to_string(), Vec::new())
    }

    #[test]
    fn test_recency_decay() {
        let today = day(2024, 6, 10);
        assert_eq!(recency_score(None, today), UNDATED_RECENCY);
        assert_eq!(recency_score(Some(today), today), 1.0);
        assert!((recency_score(Some(day(2024, 6, 6)), today) - (-1.0f64).exp()).abs() < 1e-12);
        assert_eq!(recency_score(Some(day(2024, 7, 1)), today), 1.0);
    }

    #[test]
    fn test_seniority_penalty() {
        let targets = vec!["Associate".to_string(), "Mid-Senior".to_string()];
        assert_eq!(seniority_penalty(None, &targets), 0.0);
        assert_eq!(seniority_penalty(Some("  "), &targets), 0.0);
        assert_eq!(seniority_penalty(Some("mid-senior"), &targets), 0.0);
        assert_eq!(seniority_penalty(Some("Director"), &targets), 0.25);
    }

    #[test]
    fn test_status_thresholds_inclusive() {
        let t = Thresholds {
            shortlist: 0.7,
            review: 0.5,
        };
        assert_eq!(RankStatus::classify(0.7, &t), RankStatus::Shortlisted);
        assert_eq!(RankStatus::classify(0.6999, &t), RankStatus::Review);
        assert_eq!(RankStatus::classify(0.5, &t), RankStatus::Review);
        assert_eq!(RankStatus::classify(0.4999, &t), RankStatus::New);
    }

    #[test]
    fn test_weighted_total_and_breakdown() {
        let config = RankingConfig {
            weights: AggregateWeights {
                skill: 0.5,
                semantic: 0.25,
                recency: 0.125,
                seniority: 0.125,
                company: 0.125,
            },
            ..RankingConfig::default()
        };
        let ranker = Ranker::with_backend(config, Arc::new(FixedSimilarity(0.5)));
        let today = day(2024, 6, 10);
        let mut posting = PostingRecord::new("p1", "SRE", "Acme", "Remote", "Rust services");
        posting.posted_at = Some(today);
        posting.seniority_level = Some("Director".to_string());

        let ranking = ranker.rank(&posting, &score(0.8), &profile_with_summary(), today);
        assert_eq!(ranking.breakdown.semantic, 0.5);
        assert_eq!(ranking.breakdown.recency, 1.0);
        assert_eq!(ranking.breakdown.seniority_component, 0.75);
        assert_eq!(ranking.breakdown.company, 0.0);
        // 0.4 + 0.125 + 0.125 + 0.09375, rounded to four decimals
        assert!((ranking.total - 0.74375).abs() < 1e-4);
        assert_eq!(ranking.status, RankStatus::Shortlisted);
    }

    #[test]
    fn test_semantic_component_zero_without_context_or_on_failure() {
        let ranker = Ranker::with_backend(RankingConfig::default(), Arc::new(FailingSimilarity));
        assert_eq!(ranker.semantic_score(&profile_with_summary(), "Rust services"), 0.0);

        let plain = Ranker::new(RankingConfig::default());
        let bare = ResumeProfile::new("fp".to_string(), vec!["Rust".to_string()]);
        assert_eq!(plain.semantic_score(&bare, "Rust services"), 0.0);
        assert_eq!(plain.semantic_score(&profile_with_summary(), "   "), 0.0);
    }

    #[test]
    fn test_tfidf_semantic_prefers_related_description() {
        let ranker = Ranker::new(RankingConfig::default());
        let profile = profile_with_summary();
        let related = ranker.semantic_score(&profile, "We build Rust services for our backend");
        let unrelated = ranker.semantic_score(&profile, "Pastry chef wanted for busy bakery");
        assert!(related > unrelated);
        assert!((0.0..=1.0).contains(&related));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(RankStatus::Shortlisted).unwrap(),
            "shortlisted"
        );
    }
}
