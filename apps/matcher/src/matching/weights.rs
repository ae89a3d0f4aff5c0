//! Skill importance weights.
//!
//! With corpus statistics a skill's weight falls as it becomes common:
//! `w(s) = 1 + ln(1 + N / (1 + f_s))`. Without statistics the length of the
//! skill stands in for specificity: `w(s) = 1 + len(s) / 40`.
//!
//! `WeightTable` owns the statistics; scoring only ever sees a `WeightSnapshot`,
//! so the table can be updated between postings without a scorer observing a
//! half-applied update.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::MatchError;
use crate::models::ExtractedSkillSet;

/// Anything that can weigh a skill. Implementations must be pure.
pub trait SkillWeightModel: Send + Sync {
    fn weight(&self, skill: &str) -> f64;
}

fn skill_key(skill: &str) -> String {
    skill.trim().to_lowercase()
}

// ────────────────────────────────────────────────────────────────────────────
// Corpus statistics
// ────────────────────────────────────────────────────────────────────────────

/// Postings seen so far and, per skill, how many of them mention it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_postings: u64,
    /// Keyed by lowercased skill. `BTreeMap` keeps the serialized form stable.
    pub doc_freq: BTreeMap<String, u64>,
}

impl CorpusStats {
    /// Records one posting. Each distinct skill counts once, whatever its case.
    pub fn observe<'a, I>(&mut self, skills: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.total_postings += 1;
        let distinct: HashSet<String> = skills
            .into_iter()
            .map(skill_key)
            .filter(|k| !k.is_empty())
            .collect();
        for key in distinct {
            *self.doc_freq.entry(key).or_insert(0) += 1;
        }
    }

    pub fn doc_freq(&self, skill: &str) -> u64 {
        self.doc_freq.get(&skill_key(skill)).copied().unwrap_or(0)
    }
}

/// Weight of `skill` given optional corpus statistics. Always ≥ 1.
pub fn skill_weight(skill: &str, stats: Option<&CorpusStats>) -> f64 {
    match stats {
        Some(stats) => {
            let n = stats.total_postings as f64;
            let f = stats.doc_freq(skill) as f64;
            1.0 + (1.0 + n / (1.0 + f)).ln()
        }
        None => 1.0 + skill_key(skill).chars().count() as f64 / 40.0,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Immutable view of the weights at one corpus state. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct WeightSnapshot {
    stats: Option<Arc<CorpusStats>>,
}

impl WeightSnapshot {
    pub fn length_based() -> Self {
        Self { stats: None }
    }

    pub fn from_stats(stats: CorpusStats) -> Self {
        Self {
            stats: Some(Arc::new(stats)),
        }
    }

    pub fn stats(&self) -> Option<&CorpusStats> {
        self.stats.as_deref()
    }
}

impl SkillWeightModel for WeightSnapshot {
    fn weight(&self, skill: &str) -> f64 {
        skill_weight(skill, self.stats())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Table
// ────────────────────────────────────────────────────────────────────────────

/// Owned handle over the corpus statistics, shared by reference with the pipeline.
///
/// A table built with `length_based()` never gathers statistics; one built with
/// `tracking()` or `with_stats()` does, and its snapshots use the frequency formula.
#[derive(Debug, Default)]
pub struct WeightTable {
    stats: RwLock<Option<Arc<CorpusStats>>>,
}

impl WeightTable {
    pub fn length_based() -> Self {
        Self {
            stats: RwLock::new(None),
        }
    }

    pub fn tracking() -> Self {
        Self::with_stats(CorpusStats::default())
    }

    pub fn with_stats(stats: CorpusStats) -> Self {
        Self {
            stats: RwLock::new(Some(Arc::new(stats))),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.stats.read().is_some()
    }

    pub fn snapshot(&self) -> WeightSnapshot {
        WeightSnapshot {
            stats: self.stats.read().clone(),
        }
    }

    /// Snapshot as it would be after `observe(skills)`, without recording
    /// anything. The batch scores against this and commits only once the
    /// result has been persisted.
    pub fn preview(&self, skills: &ExtractedSkillSet) -> WeightSnapshot {
        match self.stats.read().as_deref() {
            Some(stats) => {
                let mut next = stats.clone();
                next.observe(skills.names());
                WeightSnapshot::from_stats(next)
            }
            None => WeightSnapshot::length_based(),
        }
    }

    /// Counts one posting's skills. A no-op for length-based tables.
    pub fn observe(&self, skills: &ExtractedSkillSet) {
        let mut guard = self.stats.write();
        if let Some(stats) = guard.as_mut() {
            // Snapshots taken earlier keep the previous Arc untouched.
            Arc::make_mut(stats).observe(skills.names());
        }
    }

    /// Counts postings in the given order under a single write lock.
    pub fn observe_all<'a, I>(&self, sets: I)
    where
        I: IntoIterator<Item = &'a ExtractedSkillSet>,
    {
        let mut guard = self.stats.write();
        if let Some(stats) = guard.as_mut() {
            let stats = Arc::make_mut(stats);
            for set in sets {
                stats.observe(set.names());
            }
        }
    }

    pub fn stats(&self) -> Option<CorpusStats> {
        self.stats.read().as_deref().cloned()
    }

    /// Loads statistics persisted by `save`. A missing or unreadable file starts
    /// a fresh tracking table.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!("No corpus stats at {}, starting fresh", path.display());
                return Self::tracking();
            }
        };
        match serde_json::from_str::<CorpusStats>(&raw) {
            Ok(stats) => {
                debug!(
                    "Loaded corpus stats: {} postings, {} skills",
                    stats.total_postings,
                    stats.doc_freq.len()
                );
                Self::with_stats(stats)
            }
            Err(e) => {
                warn!("Ignoring unreadable corpus stats {}: {e}", path.display());
                Self::tracking()
            }
        }
    }

    /// Writes the statistics atomically. Length-based tables write nothing.
    pub fn save(&self, path: &Path) -> Result<(), MatchError> {
        let Some(stats) = self.stats() else {
            return Ok(());
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &stats)?;
        tmp.persist(path).map_err(|e| MatchError::Io(e.error))?;
        Ok(())
    }
}
