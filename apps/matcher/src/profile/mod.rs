// Resume profile: section parsing and the fingerprint-keyed single-entry cache.

pub mod cache;
pub mod parser;

pub use cache::{ProfileCache, PROFILE_CACHE_VERSION};
pub use parser::{parse_resume, parse_sections, ParsedResume, ResumeSections};
