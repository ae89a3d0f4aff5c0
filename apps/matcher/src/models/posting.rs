use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::MatchError;

/// Salary bounds as reported by the source. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryFields {
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub salary_currency: Option<String>,
    #[serde(default)]
    pub salary_period: Option<String>,
}

/// A normalized job posting as handed over by an ingestion adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub salary: SalaryFields,
    #[serde(default)]
    pub posted_at: Option<NaiveDate>,
    /// Seniority label as published by the source, e.g. "Mid-Senior".
    #[serde(default)]
    pub seniority_level: Option<String>,
    /// Source names that contributed this record.
    #[serde(default)]
    pub provenance: Vec<String>,
    #[serde(default = "default_canonical")]
    pub canonical: bool,
    #[serde(default)]
    pub duplicate_of: Option<String>,
}

fn default_canonical() -> bool {
    true
}

impl PostingRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        location: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            company: company.into(),
            location: location.into(),
            description: description.into(),
            salary: SalaryFields::default(),
            posted_at: None,
            seniority_level: None,
            provenance: Vec::new(),
            canonical: true,
            duplicate_of: None,
        }
    }

    pub fn with_provenance(mut self, source: impl Into<String>) -> Self {
        self.provenance.push(source.into());
        self
    }

    /// Checks the fields scoring depends on.
    /// A rejected posting is recorded as a per-posting failure; the batch continues.
    pub fn ensure_scorable(&self) -> Result<(), MatchError> {
        let reject = |reason: &str| {
            Err(MatchError::PostingRejected {
                id: self.id.clone(),
                reason: reason.to_string(),
            })
        };

        if self.description.trim().is_empty() {
            return reject("description is empty");
        }
        if self.description.contains('\0') {
            return reject("description contains NUL bytes");
        }
        if self.description.contains('\u{FFFD}') {
            return reject("description contains replacement characters (bad text decoding)");
        }
        if self.title.trim().is_empty() && self.company.trim().is_empty() {
            return reject("posting has neither title nor company");
        }
        Ok(())
    }
}
