//! Semantic enrichment: proposes seed skills the heuristic pass missed, by
//! lexical similarity between each seed phrase and the posting description.
//!
//! Default backend: `TfIdfSimilarity`. Any fault inside the backend, including a
//! panic, is contained here and the heuristic skills come back unchanged.

use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MatchConfig;
use crate::errors::EnrichmentError;
use crate::models::{ExtractedSkillSet, SkillProvenance};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9+.#-]+").expect("token pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub similarity_threshold: f64,
    pub max_new: usize,
    pub enable_bigrams: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.32,
            max_new: 15,
            enable_bigrams: true,
        }
    }
}

impl From<&MatchConfig> for EnrichmentConfig {
    fn from(config: &MatchConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            max_new: config.max_new_semantic,
            enable_bigrams: config.enable_bigrams,
        }
    }
}

/// Lowercased unigrams, each followed by its bigram with the next token when enabled.
pub fn tokenize(text: &str, bigrams: bool) -> Vec<String> {
    let words: Vec<String> = TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    let mut terms = Vec::with_capacity(if bigrams { words.len() * 2 } else { words.len() });
    for (i, word) in words.iter().enumerate() {
        terms.push(word.clone());
        if bigrams {
            if let Some(next) = words.get(i + 1) {
                terms.push(format!("{word}_{next}"));
            }
        }
    }
    terms
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Similarity between a description and each phrase, one value per phrase, in order.
pub trait SimilarityBackend: Send + Sync {
    fn similarities(
        &self,
        description: &str,
        phrases: &[String],
        bigrams: bool,
    ) -> Result<Vec<f64>, EnrichmentError>;

    fn name(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// TfIdfSimilarity (default backend)
// ────────────────────────────────────────────────────────────────────────────

/// Cosine similarity in a TF-IDF space whose documents are the description and
/// every phrase. `idf(t) = ln((1 + D) / (1 + df_t)) + 1`.
pub struct TfIdfSimilarity;

// BTreeMap so floating-point sums run in a fixed order.
type TermVector = BTreeMap<String, f64>;

fn term_counts(terms: &[String]) -> TermVector {
    let mut counts = TermVector::new();
    for term in terms {
        *counts.entry(term.clone()).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl SimilarityBackend for TfIdfSimilarity {
    fn similarities(
        &self,
        description: &str,
        phrases: &[String],
        bigrams: bool,
    ) -> Result<Vec<f64>, EnrichmentError> {
        let description_terms = tokenize(description, bigrams);
        if description_terms.is_empty() {
            return Err(EnrichmentError::EmptyVectorSpace);
        }

        let mut documents = Vec::with_capacity(phrases.len() + 1);
        documents.push(term_counts(&description_terms));
        documents.extend(phrases.iter().map(|p| term_counts(&tokenize(p, bigrams))));

        let mut doc_freq: BTreeMap<&str, f64> = BTreeMap::new();
        for doc in &documents {
            for term in doc.keys() {
                *doc_freq.entry(term.as_str()).or_insert(0.0) += 1.0;
            }
        }
        let total_docs = documents.len() as f64;
        let idf = |term: &str| {
            let df = doc_freq.get(term).copied().unwrap_or(0.0);
            ((1.0 + total_docs) / (1.0 + df)).ln() + 1.0
        };

        let vectors: Vec<TermVector> = documents
            .iter()
            .map(|doc| {
                doc.iter()
                    .map(|(term, tf)| (term.clone(), tf * idf(term)))
                    .collect()
            })
            .collect();

        let (description_vec, phrase_vecs) = vectors
            .split_first()
            .ok_or(EnrichmentError::EmptyVectorSpace)?;
        Ok(phrase_vecs
            .iter()
            .map(|v| cosine(description_vec, v))
            .collect())
    }

    fn name(&self) -> &'static str {
        "tfidf"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Enricher
// ────────────────────────────────────────────────────────────────────────────

/// Appends semantically similar seed skills after the heuristic ones.
#[derive(Clone)]
pub struct SemanticEnricher {
    config: EnrichmentConfig,
    backend: Arc<dyn SimilarityBackend>,
}

impl SemanticEnricher {
    pub fn new(config: EnrichmentConfig) -> Self {
        Self::with_backend(config, Arc::new(TfIdfSimilarity))
    }

    pub fn with_backend(config: EnrichmentConfig, backend: Arc<dyn SimilarityBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Heuristic skills followed by up to `max_new` seed skills whose similarity
    /// to the description reaches the threshold, best first, seed order on ties.
    ///
    /// Never fails: on any backend error or panic the heuristic set is returned as is.
    pub fn enrich(
        &self,
        heuristic: &ExtractedSkillSet,
        description: &str,
        seed_skills: &[String],
    ) -> ExtractedSkillSet {
        if self.config.max_new == 0 || seed_skills.is_empty() || description.trim().is_empty() {
            return heuristic.clone();
        }

        let attempt = catch_unwind(AssertUnwindSafe(|| {
            self.try_enrich(heuristic, description, seed_skills)
        }));

        match attempt {
            Ok(Ok(enriched)) => enriched,
            Ok(Err(e)) => {
                warn!(
                    "Semantic enrichment ({}) failed, keeping heuristic skills: {e}",
                    self.backend.name()
                );
                heuristic.clone()
            }
            Err(payload) => {
                let e = EnrichmentError::Panicked(panic_message(payload.as_ref()));
                warn!(
                    "Semantic enrichment ({}) failed, keeping heuristic skills: {e}",
                    self.backend.name()
                );
                heuristic.clone()
            }
        }
    }

    fn try_enrich(
        &self,
        heuristic: &ExtractedSkillSet,
        description: &str,
        seed_skills: &[String],
    ) -> Result<ExtractedSkillSet, EnrichmentError> {
        let scores = self
            .backend
            .similarities(description, seed_skills, self.config.enable_bigrams)?;
        if scores.len() != seed_skills.len() {
            return Err(EnrichmentError::ShapeMismatch {
                expected: seed_skills.len(),
                got: scores.len(),
            });
        }

        let mut considered = HashSet::new();
        let mut candidates: Vec<(usize, f64)> = Vec::new();
        for (idx, (seed, &sim)) in seed_skills.iter().zip(&scores).enumerate() {
            if !sim.is_finite() {
                return Err(EnrichmentError::NonFinite {
                    skill: seed.clone(),
                });
            }
            let key = seed.trim().to_lowercase();
            if key.is_empty() || heuristic.contains(seed) || !considered.insert(key) {
                continue;
            }
            if sim >= self.config.similarity_threshold {
                candidates.push((idx, sim));
            }
        }

        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        candidates.truncate(self.config.max_new);

        let mut enriched = heuristic.clone();
        for (idx, sim) in candidates {
            debug!("Semantic skill '{}' (similarity {sim:.3})", seed_skills[idx]);
            enriched.push(seed_skills[idx].clone(), SkillProvenance::Semantic);
        }
        Ok(enriched)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    struct FaultyBackend;

    impl SimilarityBackend for FaultyBackend {
        fn similarities(
            &self,
            _: &str,
            _: &[String],
            _: bool,
        ) -> Result<Vec<f64>, EnrichmentError> {
            Err(EnrichmentError::Tokenization("forced".to_string()))
        }
        fn name(&self) -> &'static str {
            "faulty"
        }
    }

    struct PanickingBackend;

    impl SimilarityBackend for PanickingBackend {
        fn similarities(
            &self,
            _: &str,
            _: &[String],
            _: bool,
        ) -> Result<Vec<f64>, EnrichmentError> {
            panic!("numeric blowup");
        }
        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    /// Returns fixed scores regardless of input.
    struct FixedBackend(Vec<f64>);

    impl SimilarityBackend for FixedBackend {
        fn similarities(
            &self,
            _: &str,
            _: &[String],
            _: bool,
        ) -> Result<Vec<f64>, EnrichmentError> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn enricher_with(backend: Arc<dyn SimilarityBackend>) -> SemanticEnricher {
        SemanticEnricher::with_backend(EnrichmentConfig::default(), backend)
    }

    #[test]
    fn test_tokenize_with_bigrams() {
        assert_eq!(
            tokenize("Build C++ data-pipelines", true),
            vec![
                "build",
                "build_c++",
                "c++",
                "c++_data-pipelines",
                "data-pipelines"
            ]
        );
        assert_eq!(tokenize("Build C++", false), vec!["build", "c++"]);
        assert!(tokenize("  !!  ", true).is_empty());
    }

    #[test]
    fn test_tfidf_identical_text_is_most_similar() {
        let sims = TfIdfSimilarity
            .similarities(
                "stream processing",
                &seeds(&["stream processing", "baking bread", "processing"]),
                true,
            )
            .unwrap();
        assert_eq!(sims.len(), 3);
        assert!((sims[0] - 1.0).abs() < 1e-9);
        assert_eq!(sims[1], 0.0);
        assert!(sims[2] > 0.0 && sims[2] < sims[0]);
    }

    #[test]
    fn test_tfidf_empty_description_is_error() {
        let err = TfIdfSimilarity
            .similarities("   ", &seeds(&["Rust"]), true)
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::EmptyVectorSpace));
    }

    #[test]
    fn test_enrich_appends_after_heuristic_prefix() {
        let heuristic = ExtractedSkillSet::from_heuristic(["Python"]);
        let enricher = SemanticEnricher::new(EnrichmentConfig::default());
        let out = enricher.enrich(
            &heuristic,
            "python stream processing with event streaming",
            &seeds(&["Python", "Stream Processing", "Pastry"]),
        );
        assert_eq!(out.names()[0], "Python");
        assert_eq!(out.names_with(SkillProvenance::Semantic), vec!["Stream Processing"]);
    }

    #[test]
    fn test_ordering_by_similarity_then_seed_order() {
        let heuristic = ExtractedSkillSet::from_heuristic(["A"]);
        let enricher = enricher_with(Arc::new(FixedBackend(vec![0.9, 0.5, 0.7, 0.5, 0.1])));
        let out = enricher.enrich(&heuristic, "text", &seeds(&["A", "B", "C", "D", "E"]));
        assert_eq!(out.names(), vec!["A", "C", "B", "D"]);
    }

    #[test]
    fn test_threshold_is_inclusive_and_max_new_truncates() {
        let heuristic = ExtractedSkillSet::default();
        let config = EnrichmentConfig {
            similarity_threshold: 0.5,
            max_new: 2,
            enable_bigrams: true,
        };
        let backend = Arc::new(FixedBackend(vec![0.5, 0.49, 0.8, 0.6]));
        let enricher = SemanticEnricher::with_backend(config, backend);
        let out = enricher.enrich(&heuristic, "text", &seeds(&["A", "B", "C", "D"]));
        assert_eq!(out.names(), vec!["C", "D"]);

        let wide = SemanticEnricher::with_backend(
            EnrichmentConfig { max_new: 10, ..config },
            Arc::new(FixedBackend(vec![0.5, 0.49, 0.8, 0.6])),
        );
        let out = wide.enrich(&heuristic, "text", &seeds(&["A", "B", "C", "D"]));
        assert_eq!(out.names(), vec!["C", "D", "A"]);
    }

    #[test]
    fn test_fault_returns_heuristic_unchanged() {
        let heuristic = ExtractedSkillSet::from_heuristic(["Rust", "SQL"]);
        let out = enricher_with(Arc::new(FaultyBackend)).enrich(
            &heuristic,
            "Rust and SQL and Kafka",
            &seeds(&["Rust", "SQL", "Kafka"]),
        );
        assert_eq!(out, heuristic);
    }

    #[test]
    fn test_panic_returns_heuristic_unchanged() {
        let heuristic = ExtractedSkillSet::from_heuristic(["Rust"]);
        let out = enricher_with(Arc::new(PanickingBackend)).enrich(
            &heuristic,
            "Rust and Kafka",
            &seeds(&["Rust", "Kafka"]),
        );
        assert_eq!(out, heuristic);
    }

    #[test]
    fn test_shape_mismatch_and_nan_return_heuristic_unchanged() {
        let heuristic = ExtractedSkillSet::from_heuristic(["Rust"]);
        let short = enricher_with(Arc::new(FixedBackend(vec![0.9])));
        assert_eq!(
            short.enrich(&heuristic, "text", &seeds(&["Rust", "Kafka"])),
            heuristic
        );
        let nan = enricher_with(Arc::new(FixedBackend(vec![0.1, f64::NAN])));
        assert_eq!(
            nan.enrich(&heuristic, "text", &seeds(&["Rust", "Kafka"])),
            heuristic
        );
    }

    #[test]
    fn test_deterministic() {
        let heuristic = ExtractedSkillSet::from_heuristic(["Python"]);
        let vocabulary = seeds(&[
            "Python",
            "Data Pipelines",
            "Pipelines",
            "Spark",
            "Data Modeling",
        ]);
        let desc = "Own data pipelines and data modeling in python; spark optional";
        let enricher = SemanticEnricher::new(EnrichmentConfig::default());
        let first = enricher.enrich(&heuristic, desc, &vocabulary);
        for _ in 0..5 {
            assert_eq!(enricher.enrich(&heuristic, desc, &vocabulary), first);
        }
    }
}
