//! Backends for the extraction cache.
//!
//! Entries are whole values: a write replaces any previous entry under the same
//! fingerprint and nothing is ever updated in place.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::MatchError;
use crate::models::ExtractedSkillSet;

/// One cached extraction result, tagged with the logic version that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExtraction {
    pub version: u32,
    pub fingerprint: String,
    /// Fingerprint of the seed vocabulary the extraction ran against.
    pub vocabulary: String,
    pub created_at: DateTime<Utc>,
    pub skills: ExtractedSkillSet,
}

impl StoredExtraction {
    /// Fails with `CacheVersionMismatch` when the entry came from other logic.
    pub fn ensure_version(&self, current: u32) -> Result<(), MatchError> {
        if self.version == current {
            Ok(())
        } else {
            Err(MatchError::CacheVersionMismatch {
                stored: self.version,
                current,
            })
        }
    }
}

/// Size/age bounds applied by the maintenance path, never during lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvictionPolicy {
    pub max_entries: usize,
    pub max_age: Option<Duration>,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_entries: 500,
            max_age: Some(Duration::days(30)),
        }
    }
}

/// Keeps the newest entries that satisfy `policy`. Returns the survivors.
fn apply_policy(
    entries: impl IntoIterator<Item = StoredExtraction>,
    policy: &EvictionPolicy,
    now: DateTime<Utc>,
) -> Vec<StoredExtraction> {
    let mut kept: Vec<StoredExtraction> = entries
        .into_iter()
        .filter(|e| policy.max_age.map_or(true, |age| now - e.created_at <= age))
        .collect();
    kept.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });
    kept.truncate(policy.max_entries);
    kept
}

/// Storage seam for `SkillExtractionCache`. Callers serialize access.
pub trait ExtractionStore: Send {
    fn get(&self, fingerprint: &str) -> Option<StoredExtraction>;

    fn put(&mut self, entry: StoredExtraction) -> Result<(), MatchError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries outside `policy`. Returns how many were removed.
    fn purge(&mut self, policy: &EvictionPolicy) -> Result<usize, MatchError>;

    fn clear(&mut self) -> Result<(), MatchError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, StoredExtraction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExtractionStore for MemoryStore {
    fn get(&self, fingerprint: &str) -> Option<StoredExtraction> {
        self.entries.get(fingerprint).cloned()
    }

    fn put(&mut self, entry: StoredExtraction) -> Result<(), MatchError> {
        self.entries.insert(entry.fingerprint.clone(), entry);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn purge(&mut self, policy: &EvictionPolicy) -> Result<usize, MatchError> {
        let before = self.entries.len();
        let kept = apply_policy(self.entries.drain().map(|(_, e)| e), policy, Utc::now());
        self.entries = kept.into_iter().map(|e| (e.fingerprint.clone(), e)).collect();
        Ok(before - self.entries.len())
    }

    fn clear(&mut self) -> Result<(), MatchError> {
        self.entries.clear();
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON-lines file store
// ────────────────────────────────────────────────────────────────────────────

/// Append-only JSON-lines file with an in-memory index.
/// Later lines win over earlier ones with the same fingerprint.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    index: HashMap<String, StoredExtraction>,
}

impl JsonlStore {
    /// Opens (or lazily creates) the store at `path`. Malformed lines are skipped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MatchError> {
        let path = path.into();
        let mut index = HashMap::new();

        if path.exists() {
            let reader = BufReader::new(fs::File::open(&path)?);
            let mut skipped = 0usize;
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<StoredExtraction>(&line) {
                    Ok(entry) => {
                        index.insert(entry.fingerprint.clone(), entry);
                    }
                    Err(_) => skipped += 1,
                }
            }
            if skipped > 0 {
                warn!("Skipped {skipped} malformed lines in {}", path.display());
            }
            debug!("Loaded {} extraction entries from {}", index.len(), path.display());
        }

        Ok(Self { path, index })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the file from the index through a temp file in the same directory.
    fn rewrite(&self) -> Result<(), MatchError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut entries: Vec<&StoredExtraction> = self.index.values().collect();
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        for entry in entries {
            serde_json::to_writer(&mut tmp, entry)?;
            tmp.write_all(b"\n")?;
        }
        tmp.persist(&self.path).map_err(|e| MatchError::Io(e.error))?;
        Ok(())
    }
}

impl ExtractionStore for JsonlStore {
    fn get(&self, fingerprint: &str) -> Option<StoredExtraction> {
        self.index.get(fingerprint).cloned()
    }

    fn put(&mut self, entry: StoredExtraction) -> Result<(), MatchError> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        // One line per write keeps each entry atomic from a reader's point of view.
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;

        self.index.insert(entry.fingerprint.clone(), entry);
        Ok(())
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn purge(&mut self, policy: &EvictionPolicy) -> Result<usize, MatchError> {
        let before = self.index.len();
        let kept = apply_policy(self.index.values().cloned(), policy, Utc::now());
        self.index = kept.into_iter().map(|e| (e.fingerprint.clone(), e)).collect();
        self.rewrite()?;
        Ok(before - self.index.len())
    }

    fn clear(&mut self) -> Result<(), MatchError> {
        self.index.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fp: &str, version: u32, age_days: i64) -> StoredExtraction {
        StoredExtraction {
            version,
            fingerprint: fp.to_string(),
            vocabulary: "vocab".to_string(),
            created_at: Utc::now() - Duration::days(age_days),
            skills: ExtractedSkillSet::from_heuristic(["Rust"]),
        }
    }

    #[test]
    fn test_version_check() {
        assert!(entry("a", 2, 0).ensure_version(2).is_ok());
        let err = entry("a", 1, 0).ensure_version(2).unwrap_err();
        assert!(matches!(
            err,
            MatchError::CacheVersionMismatch {
                stored: 1,
                current: 2
            }
        ));
    }

    #[test]
    fn test_memory_store_overwrites() {
        let mut store = MemoryStore::new();
        store.put(entry("a", 1, 0)).unwrap();
        store.put(entry("a", 2, 0)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().version, 2);
    }

    #[test]
    fn test_policy_drops_old_and_keeps_newest() {
        let mut store = MemoryStore::new();
        store.put(entry("old", 1, 40)).unwrap();
        store.put(entry("mid", 1, 5)).unwrap();
        store.put(entry("new", 1, 1)).unwrap();
        let removed = store
            .purge(&EvictionPolicy {
                max_entries: 1,
                max_age: Some(Duration::days(30)),
            })
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.get("new").is_some());
        assert!(store.get("mid").is_none());
    }

    #[test]
    fn test_jsonl_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skills_cache.jsonl");
        {
            let mut store = JsonlStore::open(&path).unwrap();
            store.put(entry("a", 1, 0)).unwrap();
            store.put(entry("b", 1, 0)).unwrap();
        }
        let store = JsonlStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap().skills.names(), vec!["Rust"]);
    }

    #[test]
    fn test_jsonl_store_later_line_wins_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skills_cache.jsonl");
        {
            let mut store = JsonlStore::open(&path).unwrap();
            store.put(entry("a", 1, 0)).unwrap();
        }
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n")
            .unwrap();
        {
            let mut store = JsonlStore::open(&path).unwrap();
            store.put(entry("a", 3, 0)).unwrap();
        }
        let store = JsonlStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().version, 3);
    }

    #[test]
    fn test_jsonl_purge_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("skills_cache.jsonl");
        let mut store = JsonlStore::open(&path).unwrap();
        for i in 0..5 {
            store.put(entry(&format!("e{i}"), 1, i)).unwrap();
        }
        let removed = store
            .purge(&EvictionPolicy {
                max_entries: 2,
                max_age: None,
            })
            .unwrap();
        assert_eq!(removed, 3);

        let reopened = JsonlStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get("e0").is_some());
        assert!(reopened.get("e1").is_some());
    }

    #[test]
    fn test_jsonl_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skills_cache.jsonl");
        let mut store = JsonlStore::open(&path).unwrap();
        store.put(entry("a", 1, 0)).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(!path.exists());
    }
}
