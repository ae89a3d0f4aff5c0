//! Single-entry profile cache keyed by a fingerprint of the resume content and
//! the seed skill list, optionally mirrored to a JSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::MatchError;
use crate::fingerprint::profile_fingerprint;
use crate::models::ResumeProfile;
use crate::profile::parser::parse_resume;

/// Bumped whenever parsing rules change so stored profiles are rebuilt.
pub const PROFILE_CACHE_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct StoredProfile {
    version: u32,
    created_at: DateTime<Utc>,
    profile: ResumeProfile,
}

impl StoredProfile {
    fn ensure_version(&self) -> Result<(), MatchError> {
        if self.version == PROFILE_CACHE_VERSION {
            Ok(())
        } else {
            Err(MatchError::CacheVersionMismatch {
                stored: self.version,
                current: PROFILE_CACHE_VERSION,
            })
        }
    }
}

pub struct ProfileCache {
    path: Option<PathBuf>,
    entry: Mutex<Option<Arc<ResumeProfile>>>,
}

impl ProfileCache {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entry: Mutex::new(None),
        }
    }

    /// Cache mirrored to `path`. An unreadable or outdated file is ignored.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entry = load_stored(&path).map(Arc::new);
        Self {
            path: Some(path),
            entry: Mutex::new(entry),
        }
    }

    /// Returns the cached profile when its fingerprint matches and no rebuild
    /// is forced; otherwise parses `resume_content` and replaces the entry.
    ///
    /// A parse failure propagates and leaves the previous entry in place.
    pub fn get_or_build(
        &self,
        resume_content: &str,
        seed_skills: &[String],
        force_rebuild: bool,
    ) -> Result<Arc<ResumeProfile>, MatchError> {
        let fingerprint = profile_fingerprint(resume_content, seed_skills);
        let mut entry = self.entry.lock();

        if !force_rebuild {
            if let Some(profile) = entry.as_ref().filter(|p| p.fingerprint == fingerprint) {
                debug!("Profile cache hit {}", &fingerprint[..12]);
                return Ok(Arc::clone(profile));
            }
        }

        let parsed = parse_resume(resume_content, seed_skills)?;
        let profile = Arc::new(
            ResumeProfile::new(fingerprint, parsed.skills)
                .with_context(parsed.summary, parsed.responsibilities),
        );
        info!(
            "Built resume profile: {} skills, core {}, {} responsibilities",
            profile.skills.len(),
            profile.core_len,
            profile.responsibilities.len()
        );

        if let Some(path) = &self.path {
            if let Err(e) = save_stored(path, &profile) {
                warn!("Failed to persist profile cache {}: {e}", path.display());
            }
        }
        *entry = Some(Arc::clone(&profile));
        Ok(profile)
    }

    pub fn cached(&self) -> Option<Arc<ResumeProfile>> {
        self.entry.lock().clone()
    }
}

fn load_stored(path: &Path) -> Option<ResumeProfile> {
    let raw = std::fs::read_to_string(path).ok()?;
    let stored: StoredProfile = match serde_json::from_str(&raw) {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Ignoring unreadable profile cache {}: {e}", path.display());
            return None;
        }
    };
    if let Err(e) = stored.ensure_version() {
        debug!("Discarding profile cache: {e}");
        return None;
    }
    Some(stored.profile)
}

fn save_stored(path: &Path, profile: &ResumeProfile) -> Result<(), MatchError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let stored = StoredProfile {
        version: PROFILE_CACHE_VERSION,
        created_at: Utc::now(),
        profile: profile.clone(),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, &stored)?;
    tmp.persist(path).map_err(|e| MatchError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    const RESUME: &str = "TECHNICAL SKILLS\nPython, SQL, Airflow\n";

    #[test]
    fn test_hit_returns_same_profile() {
        let cache = ProfileCache::in_memory();
        let first = cache.get_or_build(RESUME, &seeds(&["Rust"]), false).unwrap();
        let second = cache.get_or_build(RESUME, &seeds(&["Rust"]), false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.skills, vec!["Python", "SQL", "Airflow", "Rust"]);
        assert_eq!(first.summary, "TECHNICAL SKILLS Python, SQL, Airflow");
    }

    #[test]
    fn test_seed_change_rebuilds() {
        let cache = ProfileCache::in_memory();
        let first = cache.get_or_build(RESUME, &seeds(&["Rust"]), false).unwrap();
        let second = cache.get_or_build(RESUME, &seeds(&["Go"]), false).unwrap();
        assert_ne!(first.fingerprint, second.fingerprint);
        assert_eq!(second.skills.last().map(String::as_str), Some("Go"));
    }

    #[test]
    fn test_force_rebuild() {
        let cache = ProfileCache::in_memory();
        let first = cache.get_or_build(RESUME, &[], false).unwrap();
        let rebuilt = cache.get_or_build(RESUME, &[], true).unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(first.skills, rebuilt.skills);
    }

    #[test]
    fn test_parse_error_propagates_and_keeps_entry() {
        let cache = ProfileCache::in_memory();
        let good = cache.get_or_build(RESUME, &[], false).unwrap();
        let err = cache.get_or_build("  ", &[], false).unwrap_err();
        assert!(matches!(err, MatchError::ProfileParse(_)));
        assert!(Arc::ptr_eq(&cache.cached().unwrap(), &good));
    }

    #[test]
    fn test_persistent_cache_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume_profile_cache.json");
        let built = {
            let cache = ProfileCache::persistent(&path);
            cache.get_or_build(RESUME, &seeds(&["Rust"]), false).unwrap()
        };
        let reopened = ProfileCache::persistent(&path);
        let loaded = reopened.cached().unwrap();
        assert_eq!(*loaded, *built);
        let hit = reopened.get_or_build(RESUME, &seeds(&["Rust"]), false).unwrap();
        assert!(Arc::ptr_eq(&hit, &loaded));
    }

    #[test]
    fn test_outdated_cache_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume_profile_cache.json");
        let stale = StoredProfile {
            version: PROFILE_CACHE_VERSION + 1,
            created_at: Utc::now(),
            profile: ResumeProfile::new("fp".to_string(), vec!["Cobol".to_string()]),
        };
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();
        assert!(ProfileCache::persistent(&path).cached().is_none());

        std::fs::write(&path, "{broken").unwrap();
        assert!(ProfileCache::persistent(&path).cached().is_none());
    }
}
