//! Persistence seam for scored postings.
//!
//! The pipeline calls a sink sequentially, in input order, after the parallel
//! phase has finished.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::errors::MatchError;
use crate::matching::ScoreResult;
use crate::models::{ExtractedSkillSet, PostingRecord};
use crate::ranking::Ranking;

/// One posting with the skills found in it, its skill score and its ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPosting {
    pub run_id: Uuid,
    pub posting: PostingRecord,
    pub skills: ExtractedSkillSet,
    pub score: ScoreResult,
    pub ranking: Ranking,
    pub scored_at: DateTime<Utc>,
}

#[async_trait]
pub trait ScoreSink: Send + Sync {
    async fn persist(&self, scored: &ScoredPosting) -> Result<(), MatchError>;

    async fn flush(&self) -> Result<(), MatchError> {
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MemorySink
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySink {
    items: Mutex<Vec<ScoredPosting>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<ScoredPosting> {
        self.items.lock().clone()
    }
}

#[async_trait]
impl ScoreSink for MemorySink {
    async fn persist(&self, scored: &ScoredPosting) -> Result<(), MatchError> {
        self.items.lock().push(scored.clone());
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JsonlSink
// ────────────────────────────────────────────────────────────────────────────

/// Writes one JSON object per line. The file is truncated on creation.
pub struct JsonlSink {
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonlSink {
    pub async fn create(path: &Path) -> Result<Self, MatchError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let file = tokio::fs::File::create(path).await?;
        Ok(Self {
            file: tokio::sync::Mutex::new(file),
        })
    }
}

#[async_trait]
impl ScoreSink for JsonlSink {
    async fn persist(&self, scored: &ScoredPosting) -> Result<(), MatchError> {
        let mut line = serde_json::to_vec(scored)?;
        line.push(b'\n');
        self.file.lock().await.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), MatchError> {
        self.file.lock().await.flush().await?;
        Ok(())
    }
}
