//! Batch orchestration.
//!
//! 1. Every posting is validated; rejected ones become per-posting failures.
//! 2. Extraction and semantic enrichment run on a bounded pool of blocking
//!    workers. The extraction cache is the only shared mutable state here.
//! 3. In input order: the posting is scored against a weight snapshot that
//!    already counts it, ranked, and handed to the sink. Its skills are
//!    committed to the corpus statistics only once the sink accepted it.
//!
//! Cancellation is checked between postings. A posting that was not started,
//! or not yet persisted, is reported as cancelled and leaves no score behind.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MAX_WORKERS_LIMIT;
use crate::errors::MatchError;
use crate::extraction::SkillExtractionCache;
use crate::matching::{SemanticEnricher, SkillScorer, WeightTable};
use crate::models::{ExtractedSkillSet, PostingRecord, ResumeProfile};
use crate::pipeline::sink::{ScoreSink, ScoredPosting};
use crate::ranking::{RankStatus, Ranker};

/// Shared handles a batch runs against.
#[derive(Clone)]
pub struct BatchContext {
    pub extraction: Arc<SkillExtractionCache>,
    /// `None` when the semantic layer is switched off.
    pub enricher: Option<SemanticEnricher>,
    /// Pluggable scorer. Default: `WeightedF1Scorer`.
    pub scorer: Arc<dyn SkillScorer>,
    pub weights: Arc<WeightTable>,
    pub ranker: Arc<Ranker>,
    pub extraction_version: u32,
    pub max_workers: usize,
}

/// Cooperative cancellation shared between the caller and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostingOutcome {
    Scored {
        posting_id: String,
        skill_score: f64,
        total: f64,
        rank_status: RankStatus,
    },
    Failed { posting_id: String, code: String, reason: String },
    Cancelled { posting_id: String },
}

impl PostingOutcome {
    fn failed(posting_id: &str, err: &MatchError) -> Self {
        PostingOutcome::Failed {
            posting_id: posting_id.to_string(),
            code: err.code().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn posting_id(&self) -> &str {
        match self {
            PostingOutcome::Scored { posting_id, .. }
            | PostingOutcome::Failed { posting_id, .. }
            | PostingOutcome::Cancelled { posting_id } => posting_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub processed: usize,
    pub scored: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub shortlisted: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub avg_score: f64,
    pub avg_total: f64,
    pub avg_skills: f64,
    pub workers: usize,
    pub scorer_backend: String,
    pub semantic_enabled: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    /// One outcome per input posting, in input order.
    pub outcomes: Vec<PostingOutcome>,
}

// ────────────────────────────────────────────────────────────────────────────
// Worker
// ────────────────────────────────────────────────────────────────────────────

fn extract_and_enrich(
    cache: &SkillExtractionCache,
    enricher: Option<&SemanticEnricher>,
    description: &str,
    extraction_version: u32,
) -> ExtractedSkillSet {
    let heuristic = cache.get_or_extract(description, extraction_version);
    match enricher {
        Some(enricher) => enricher.enrich(&heuristic, description, cache.seed_skills()),
        None => heuristic,
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

type ExtractionResult = Result<ExtractedSkillSet, String>;

/// Drains the worker set. A worker that panicked, or a task that never
/// completed, turns its posting into an `INTERNAL_ERROR` failure.
async fn collect_extractions(
    mut tasks: JoinSet<(usize, ExtractionResult)>,
    task_index: &HashMap<task::Id, usize>,
    ids: &[String],
    outcomes: &mut [Option<PostingOutcome>],
) -> Vec<Option<ExtractedSkillSet>> {
    let mut extracted: Vec<Option<ExtractedSkillSet>> = vec![None; ids.len()];
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((_, (idx, Ok(skills)))) => extracted[idx] = Some(skills),
            Ok((_, (idx, Err(reason)))) => {
                warn!("Worker for posting {} panicked: {reason}", ids[idx]);
                let err = MatchError::Internal(anyhow::anyhow!("worker panicked: {reason}"));
                outcomes[idx] = Some(PostingOutcome::failed(&ids[idx], &err));
            }
            Err(e) => match task_index.get(&e.id()) {
                Some(&idx) => {
                    warn!("Extraction task for posting {} did not complete: {e}", ids[idx]);
                    let err = MatchError::Internal(anyhow::anyhow!("extraction task lost: {e}"));
                    outcomes[idx] = Some(PostingOutcome::failed(&ids[idx], &err));
                }
                None => warn!("Untracked extraction task did not complete: {e}"),
            },
        }
    }
    extracted
}

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

/// Scores `postings` against `profile`, persisting each result through `sink`.
///
/// Per-posting problems never abort the batch; only a failing `sink.flush()`
/// is returned as an error.
pub async fn run_batch(
    ctx: &BatchContext,
    profile: Arc<ResumeProfile>,
    postings: Vec<PostingRecord>,
    sink: &dyn ScoreSink,
    cancel: &CancelFlag,
) -> Result<BatchReport, MatchError> {
    let started = Instant::now();
    let run_id = Uuid::new_v4();
    let workers = ctx.max_workers.clamp(1, MAX_WORKERS_LIMIT);
    let stats_before = ctx.extraction.stats();
    let total = postings.len();
    let ids: Vec<String> = postings.iter().map(|p| p.id.clone()).collect();

    info!(
        "Batch {run_id}: {total} postings, {workers} workers, semantic {}",
        if ctx.enricher.is_some() { "on" } else { "off" }
    );

    let mut outcomes: Vec<Option<PostingOutcome>> = vec![None; total];
    for (idx, posting) in postings.iter().enumerate() {
        if let Err(e) = posting.ensure_scorable() {
            warn!("Skipping posting {}: {e}", posting.id);
            outcomes[idx] = Some(PostingOutcome::failed(&posting.id, &e));
        }
    }

    // ── Parallel phase ──────────────────────────────────────────────────────
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks: JoinSet<(usize, ExtractionResult)> = JoinSet::new();
    let mut task_index: HashMap<task::Id, usize> = HashMap::new();

    for (idx, posting) in postings.iter().enumerate() {
        if outcomes[idx].is_some() {
            continue;
        }
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        if cancel.is_cancelled() {
            break;
        }

        let cache = Arc::clone(&ctx.extraction);
        let enricher = ctx.enricher.clone();
        let description = posting.description.clone();
        let version = ctx.extraction_version;
        let handle = tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = catch_unwind(AssertUnwindSafe(|| {
                extract_and_enrich(&cache, enricher.as_ref(), &description, version)
            }))
            .map_err(|payload| panic_reason(payload.as_ref()));
            (idx, result)
        });
        task_index.insert(handle.id(), idx);
    }

    let mut extracted = collect_extractions(tasks, &task_index, &ids, &mut outcomes).await;

    // ── Sequential phase ────────────────────────────────────────────────────
    let today = Utc::now().date_naive();
    let mut score_total = 0.0;
    let mut rank_total = 0.0;
    let mut skills_total = 0usize;
    for (idx, posting) in postings.into_iter().enumerate() {
        if outcomes[idx].is_some() {
            continue;
        }
        let Some(skills) = extracted[idx].take() else {
            outcomes[idx] = Some(PostingOutcome::Cancelled {
                posting_id: posting.id,
            });
            continue;
        };
        if cancel.is_cancelled() {
            outcomes[idx] = Some(PostingOutcome::Cancelled {
                posting_id: posting.id,
            });
            continue;
        }

        let snapshot = ctx.weights.preview(&skills);
        let score = ctx.scorer.score(&profile, &skills, &snapshot);
        let ranking = ctx.ranker.rank(&posting, &score, &profile, today);

        let scored = ScoredPosting {
            run_id,
            posting,
            skills,
            score,
            ranking,
            scored_at: Utc::now(),
        };
        let posting_id = scored.posting.id.clone();
        match sink.persist(&scored).await {
            Ok(()) => {
                ctx.weights.observe(&scored.skills);
                debug!(
                    "Scored {posting_id}: {:.3}, total {:.4} {:?} ({} skills, overlap {})",
                    scored.score.skill_score,
                    scored.ranking.total,
                    scored.ranking.status,
                    scored.skills.len(),
                    scored.score.overlap_count
                );
                score_total += scored.score.skill_score;
                rank_total += scored.ranking.total;
                skills_total += scored.skills.len();
                outcomes[idx] = Some(PostingOutcome::Scored {
                    posting_id,
                    skill_score: scored.score.skill_score,
                    total: scored.ranking.total,
                    rank_status: scored.ranking.status,
                });
            }
            Err(e) => {
                warn!("Failed to persist score for {posting_id}: {e}");
                outcomes[idx] = Some(PostingOutcome::failed(&posting_id, &e));
            }
        }
    }
    sink.flush().await?;

    let outcomes: Vec<PostingOutcome> = outcomes
        .into_iter()
        .zip(ids)
        .map(|(o, posting_id)| o.unwrap_or(PostingOutcome::Cancelled { posting_id }))
        .collect();

    let scored = outcomes
        .iter()
        .filter(|o| matches!(o, PostingOutcome::Scored { .. }))
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, PostingOutcome::Failed { .. }))
        .count();
    let cancelled = outcomes
        .iter()
        .filter(|o| matches!(o, PostingOutcome::Cancelled { .. }))
        .count();
    let shortlisted = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                PostingOutcome::Scored {
                    rank_status: RankStatus::Shortlisted,
                    ..
                }
            )
        })
        .count();
    let stats_after = ctx.extraction.stats();

    let summary = BatchSummary {
        run_id,
        processed: total,
        scored,
        failed,
        cancelled,
        shortlisted,
        cache_hits: stats_after.hits - stats_before.hits,
        cache_misses: stats_after.misses - stats_before.misses,
        avg_score: if scored > 0 { score_total / scored as f64 } else { 0.0 },
        avg_total: if scored > 0 { rank_total / scored as f64 } else { 0.0 },
        avg_skills: if scored > 0 {
            skills_total as f64 / scored as f64
        } else {
            0.0
        },
        workers,
        scorer_backend: ctx.scorer.backend().to_string(),
        semantic_enabled: ctx.enricher.is_some(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        "Batch {run_id} done: {scored} scored ({shortlisted} shortlisted), {failed} failed, \
         {cancelled} cancelled, cache {}/{} hit/miss, avg score {:.3}, {} ms",
        summary.cache_hits, summary.cache_misses, summary.avg_score, summary.elapsed_ms
    );

    Ok(BatchReport { summary, outcomes })
}
