//! Job posting skill matcher: weighted skill scoring against a resume profile,
//! optional semantic enrichment, fingerprint-keyed caches, duplicate detection
//! across posting sources, and a final weighted ranking.

pub mod config;
pub mod dedup;
pub mod errors;
pub mod extraction;
pub mod fingerprint;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod profile;
pub mod ranking;

pub use errors::{EnrichmentError, MatchError};
