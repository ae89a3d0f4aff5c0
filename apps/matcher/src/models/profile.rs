use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const CORE_MIN: usize = 8;
const CORE_MAX: usize = 24;

/// Size of the core subset for a resume with `total` skills.
/// `clamp(floor(total / 2), 8, 24)`, never more than `total`.
pub fn core_subset_len(total: usize) -> usize {
    if total < CORE_MIN {
        total
    } else {
        (total / 2).clamp(CORE_MIN, CORE_MAX)
    }
}

/// Parsed resume: skills in first-seen order plus the derived core prefix,
/// and the free-text context used for semantic ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub fingerprint: String,
    pub skills: Vec<String>,
    pub core_len: usize,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    pub built_at: DateTime<Utc>,
}

impl ResumeProfile {
    pub fn new(fingerprint: String, skills: Vec<String>) -> Self {
        let core_len = core_subset_len(skills.len());
        Self {
            fingerprint,
            skills,
            core_len,
            summary: String::new(),
            responsibilities: Vec::new(),
            built_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, summary: String, responsibilities: Vec<String>) -> Self {
        self.summary = summary;
        self.responsibilities = responsibilities;
        self
    }

    /// Summary followed by responsibility phrases, blanks skipped.
    pub fn context_phrases(&self) -> Vec<String> {
        std::iter::once(&self.summary)
            .chain(&self.responsibilities)
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect()
    }

    /// An empty profile; callers choose this explicitly after a parse failure.
    pub fn empty() -> Self {
        Self::new(String::new(), Vec::new())
    }

    /// The highest-priority prefix of `skills`, used as the recall denominator.
    pub fn core(&self) -> &[String] {
        &self.skills[..self.core_len.min(self.skills.len())]
    }
}
