// Skill extraction: seed-phrase heuristic plus the fingerprint-keyed cache in front of it.
// Extraction never reports a skill outside the seed vocabulary.

pub mod cache;
pub mod heuristic;
pub mod store;

pub use cache::{CacheStats, SkillExtractionCache};
pub use heuristic::{extract_skills, load_seed_skills};
pub use store::{EvictionPolicy, ExtractionStore, JsonlStore, MemoryStore, StoredExtraction};
