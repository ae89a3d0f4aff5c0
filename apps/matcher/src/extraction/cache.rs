//! Fingerprint-keyed get-or-extract cache in front of the heuristic extractor.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::MatchError;
use crate::extraction::heuristic::extract_skills;
use crate::extraction::store::{EvictionPolicy, ExtractionStore, MemoryStore, StoredExtraction};
use crate::fingerprint::{description_fingerprint, vocabulary_fingerprint};
use crate::models::ExtractedSkillSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Owns the seed vocabulary and the store of per-description extraction results.
///
/// The store is the only shared mutable state touched by parallel workers, so
/// every read and every write goes through one mutex. Extraction itself runs
/// outside the lock; two workers racing on the same description compute the
/// same value, and the second write replaces the first with identical content.
pub struct SkillExtractionCache {
    seed_skills: Vec<String>,
    vocabulary: String,
    store: Mutex<Box<dyn ExtractionStore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SkillExtractionCache {
    pub fn new(seed_skills: Vec<String>, store: Box<dyn ExtractionStore>) -> Self {
        let vocabulary = vocabulary_fingerprint(&seed_skills);
        Self {
            seed_skills,
            vocabulary,
            store: Mutex::new(store),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn in_memory(seed_skills: Vec<String>) -> Self {
        Self::new(seed_skills, Box::new(MemoryStore::new()))
    }

    pub fn seed_skills(&self) -> &[String] {
        &self.seed_skills
    }

    /// Returns the cached extraction for `description`, or extracts and stores it.
    ///
    /// Entries written by another extraction version or against another seed
    /// vocabulary are treated as misses and overwritten. A failed write is
    /// logged; the freshly extracted value is still returned.
    pub fn get_or_extract(&self, description: &str, extraction_version: u32) -> ExtractedSkillSet {
        let fingerprint = description_fingerprint(description, extraction_version);

        let cached = self.store.lock().get(&fingerprint);
        if let Some(entry) = cached {
            match self.validate(&entry, extraction_version) {
                Ok(()) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("Extraction cache hit {}", &fingerprint[..12]);
                    return entry.skills;
                }
                Err(reason) => {
                    debug!("Extraction cache entry {} invalid: {reason}", &fingerprint[..12]);
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let skills =
            ExtractedSkillSet::from_heuristic(extract_skills(description, &self.seed_skills));

        let entry = StoredExtraction {
            version: extraction_version,
            fingerprint,
            vocabulary: self.vocabulary.clone(),
            created_at: Utc::now(),
            skills: skills.clone(),
        };
        if let Err(e) = self.store.lock().put(entry) {
            warn!("Failed to persist extraction cache entry: {e}");
        }
        skills
    }

    fn validate(
        &self,
        entry: &StoredExtraction,
        extraction_version: u32,
    ) -> Result<(), MatchError> {
        entry.ensure_version(extraction_version)?;
        if entry.vocabulary != self.vocabulary {
            return Err(MatchError::CacheVocabularyMismatch);
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// External eviction hook; never called from the lookup path.
    pub fn purge(&self, policy: &EvictionPolicy) -> Result<usize, MatchError> {
        self.store.lock().purge(policy)
    }

    pub fn clear(&self) -> Result<(), MatchError> {
        self.store.lock().clear()
    }
}
