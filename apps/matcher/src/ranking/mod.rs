// Ranking: blends the skill score with semantic, recency, seniority and company
// components into one total and sorts postings into shortlist/review/new.

pub mod aggregate;
pub mod config;

pub use aggregate::{recency_score, seniority_penalty, RankBreakdown, RankStatus, Ranker, Ranking};
pub use config::{AggregateWeights, RankingConfig, Thresholds};
