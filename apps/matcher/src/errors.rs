use thiserror::Error;

/// Core error type.
/// Variants mirror the failure taxonomy: which ones propagate and which ones are
/// recovered locally is decided by the caller, not here.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Resume profile could not be parsed: {0}")]
    ProfileParse(String),

    #[error("Cache entry version mismatch (stored {stored}, current {current})")]
    CacheVersionMismatch { stored: u32, current: u32 },

    #[error("Cache entry was built against a different seed vocabulary")]
    CacheVocabularyMismatch,

    #[error("Semantic enrichment failed: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("Posting {id} rejected: {reason}")]
    PostingRejected { id: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Faults raised inside the semantic enrichment layer.
/// Never escapes `SemanticEnricher::enrich`; it degrades to heuristic output instead.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("description produced no tokens")]
    EmptyVectorSpace,

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("non-finite similarity for '{skill}'")]
    NonFinite { skill: String },

    #[error("backend returned {got} similarities for {expected} phrases")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("similarity backend panicked: {0}")]
    Panicked(String),
}

impl MatchError {
    /// Short machine-readable code, used in per-posting failure records.
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::ProfileParse(_) => "PROFILE_PARSE_ERROR",
            MatchError::CacheVersionMismatch { .. } => "CACHE_VERSION_MISMATCH",
            MatchError::CacheVocabularyMismatch => "CACHE_VOCABULARY_MISMATCH",
            MatchError::Enrichment(_) => "ENRICHMENT_FAILURE",
            MatchError::ConfigValidation(_) => "CONFIG_VALIDATION_ERROR",
            MatchError::PostingRejected { .. } => "POSTING_REJECTED",
            MatchError::Io(_) => "IO_ERROR",
            MatchError::Serialization(_) => "SERIALIZATION_ERROR",
            MatchError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T, E = MatchError> = std::result::Result<T, E>;
