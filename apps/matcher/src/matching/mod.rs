// Skill matching: corpus weights, optional semantic enrichment, weighted F1 scoring.
// Scoring is pure; the only shared state it reads is an immutable weight snapshot.

pub mod scoring;
pub mod semantic;
pub mod weights;

pub use scoring::{compose_score, ScoreResult, SkillScorer, WeightedF1Scorer, WeightedSums};
pub use semantic::{EnrichmentConfig, SemanticEnricher, SimilarityBackend, TfIdfSimilarity};
pub use weights::{skill_weight, CorpusStats, SkillWeightModel, WeightSnapshot, WeightTable};
