//! Skill scoring: weighted precision/recall of a posting's skills against the
//! resume core, plus a capped breadth bonus.
//!
//! Default: `WeightedF1Scorer`. The pipeline holds an `Arc<dyn SkillScorer>`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::matching::weights::SkillWeightModel;
use crate::models::{ExtractedSkillSet, ResumeProfile};

const BREADTH_CAP: f64 = 0.08;
/// Share of the weighted core at which the breadth bonus saturates.
const BREADTH_SATURATION: f64 = 0.35;

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

/// Per-posting score with its diagnostics. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub breadth_bonus: f64,
    pub skill_score: f64, // 0.0 – 1.0
    /// Core skills the posting asks for, in core order.
    pub overlap: Vec<String>,
    pub overlap_count: usize,
    pub core_size: usize,
}

/// Weighted sums feeding the composite: overlap `O`, posting skills `J`, core `C`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSums {
    pub overlap: f64,
    pub extracted: f64,
    pub core: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composite {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub breadth_bonus: f64,
    pub skill_score: f64,
}

/// Applies the scoring formula to precomputed weighted sums.
/// Zero denominators yield zero terms; the score is clamped to `[0, 1]`.
pub fn compose_score(sums: WeightedSums) -> Composite {
    let WeightedSums {
        overlap,
        extracted,
        core,
    } = sums;

    let precision = if extracted > 0.0 { overlap / extracted } else { 0.0 };
    let recall = if core > 0.0 { overlap / core } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    let breadth_bonus = if core > 0.0 {
        BREADTH_CAP.min(BREADTH_CAP * (overlap / (BREADTH_SATURATION * core)))
    } else {
        0.0
    };

    let raw = (f1 + breadth_bonus).min(1.0);
    let skill_score = if raw.is_finite() { raw.max(0.0) } else { 0.0 };

    Composite {
        precision,
        recall,
        f1,
        breadth_bonus,
        skill_score,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Scores one posting's skills against a resume profile.
/// Implementations must be pure: same inputs, same result.
pub trait SkillScorer: Send + Sync {
    fn score(
        &self,
        profile: &ResumeProfile,
        extracted: &ExtractedSkillSet,
        weights: &dyn SkillWeightModel,
    ) -> ScoreResult;

    /// Short label recorded in run summaries.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// WeightedF1Scorer
// ────────────────────────────────────────────────────────────────────────────

/// Weighted F1 between the resume core `C` and posting skills `J`, with
/// `O = C ∩ J` compared case-insensitively.
pub struct WeightedF1Scorer;

impl SkillScorer for WeightedF1Scorer {
    fn score(
        &self,
        profile: &ResumeProfile,
        extracted: &ExtractedSkillSet,
        weights: &dyn SkillWeightModel,
    ) -> ScoreResult {
        score_skills(profile, extracted, weights)
    }

    fn backend(&self) -> &'static str {
        "weighted_f1"
    }
}

fn score_skills(
    profile: &ResumeProfile,
    extracted: &ExtractedSkillSet,
    weights: &dyn SkillWeightModel,
) -> ScoreResult {
    let posting_keys = extracted.key_set();

    let mut core_seen = HashSet::new();
    let mut overlap = Vec::new();
    let mut w_core = 0.0;
    let mut w_overlap = 0.0;
    for skill in profile.core() {
        let key = skill.to_lowercase();
        if !core_seen.insert(key.clone()) {
            continue;
        }
        let w = weights.weight(skill);
        w_core += w;
        if posting_keys.contains(&key) {
            w_overlap += w;
            overlap.push(skill.clone());
        }
    }

    let w_extracted: f64 = extracted.iter().map(|s| weights.weight(&s.skill)).sum();

    let c = compose_score(WeightedSums {
        overlap: w_overlap,
        extracted: w_extracted,
        core: w_core,
    });

    ScoreResult {
        precision: c.precision,
        recall: c.recall,
        f1: c.f1,
        breadth_bonus: c.breadth_bonus,
        skill_score: c.skill_score,
        overlap_count: overlap.len(),
        overlap,
        core_size: core_seen.len(),
    }
}
