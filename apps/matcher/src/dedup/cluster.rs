//! Duplicate clustering and metadata merge.
//!
//! Phase 1 buckets postings by exact signature; phase 2 compares the phase-1
//! leaders that share a normalized (company, location). Both phases only record
//! decisions. The fold/merge then walks the postings once in input order, so the
//! earliest posting of every cluster is its canonical record regardless of how
//! the decisions were reached.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MatchConfig;
use crate::dedup::signature::{bucket_key, signature};
use crate::dedup::similarity::{description_tokens, jaccard, title_ratio};
use crate::models::PostingRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    pub enable_similarity: bool,
    pub title_fuzzy_min: u8,
    pub jaccard_min: f64,
    pub description_prefix_length: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enable_similarity: true,
            title_fuzzy_min: 90,
            jaccard_min: 0.82,
            description_prefix_length: 120,
        }
    }
}

impl From<&MatchConfig> for DedupConfig {
    fn from(config: &MatchConfig) -> Self {
        Self {
            enable_similarity: config.enable_similarity_dedupe,
            title_fuzzy_min: config.title_fuzzy_min,
            jaccard_min: config.jaccard_min,
            description_prefix_length: config.description_prefix_length,
        }
    }
}

/// Terminal state of a posting after deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PostingState {
    Canonical,
    Duplicate { of: String },
}

/// Per-posting result handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingAssignment {
    pub posting_id: String,
    #[serde(flatten)]
    pub state: PostingState,
    /// For canonical postings, the merged provenance of the whole cluster.
    pub provenance: Vec<String>,
}

/// A canonical posting and what was folded into it, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub canonical: PostingRecord,
    pub absorbed_ids: Vec<String>,
    pub absorbed_provenance: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    /// Canonical postings with merged metadata, in input order.
    pub canonical: Vec<PostingRecord>,
    /// Postings marked duplicate, in input order.
    pub duplicates: Vec<PostingRecord>,
    /// Only clusters that absorbed at least one posting.
    pub clusters: Vec<DuplicateCluster>,
    /// One entry per input posting, in input order.
    pub assignments: Vec<PostingAssignment>,
    pub duplicates_marked: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Decision phases
// ────────────────────────────────────────────────────────────────────────────

/// `parent[i] = Some(j)` marks posting `i` as a duplicate of the earlier posting `j`.
fn exact_signature_pass(
    postings: &[PostingRecord],
    config: &DedupConfig,
    parent: &mut [Option<usize>],
) -> Vec<Vec<usize>> {
    let mut leaders: HashMap<String, usize> = HashMap::new();
    let mut bucket_index: HashMap<(String, String), usize> = HashMap::new();
    let mut buckets: Vec<Vec<usize>> = Vec::new();

    for (idx, posting) in postings.iter().enumerate() {
        let Some(sig) = signature(posting, config.description_prefix_length) else {
            continue;
        };
        if let Some(&leader) = leaders.get(&sig) {
            parent[idx] = Some(leader);
            continue;
        }
        leaders.insert(sig, idx);

        let key = bucket_key(posting);
        let slot = *bucket_index.entry(key).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(idx);
    }
    buckets
}

/// Compares every (earlier, later) pair of surviving postings per bucket.
/// Thresholds are inclusive.
fn near_duplicate_pass(
    postings: &[PostingRecord],
    buckets: &[Vec<usize>],
    config: &DedupConfig,
    parent: &mut [Option<usize>],
) {
    for bucket in buckets.iter().filter(|b| b.len() > 1) {
        let tokens: Vec<HashSet<String>> = bucket
            .iter()
            .map(|&idx| description_tokens(&postings[idx].description))
            .collect();

        for i in 0..bucket.len() {
            let earlier = bucket[i];
            if parent[earlier].is_some() {
                continue;
            }
            for j in (i + 1)..bucket.len() {
                let later = bucket[j];
                if parent[later].is_some() {
                    continue;
                }
                let ratio = title_ratio(&postings[earlier].title, &postings[later].title);
                if ratio < config.title_fuzzy_min {
                    continue;
                }
                let jac = jaccard(&tokens[i], &tokens[j]);
                if jac >= config.jaccard_min {
                    debug!(
                        "Near duplicate: {} ~ {} (title {ratio}, jaccard {jac:.3})",
                        postings[later].id, postings[earlier].id
                    );
                    parent[later] = Some(earlier);
                }
            }
        }
    }
}

fn find_root(parent: &[Option<usize>], mut idx: usize) -> usize {
    while let Some(p) = parent[idx] {
        idx = p;
    }
    idx
}

// ────────────────────────────────────────────────────────────────────────────
// Merge
// ────────────────────────────────────────────────────────────────────────────

/// Folds `duplicate` into `canonical`: provenance appended, strictly longer
/// description taken, missing salary fields, posting date and seniority filled in.
fn merge_into(canonical: &mut PostingRecord, duplicate: &PostingRecord) {
    for tag in &duplicate.provenance {
        if !canonical.provenance.contains(tag) {
            canonical.provenance.push(tag.clone());
        }
    }

    if duplicate.description.chars().count() > canonical.description.chars().count() {
        canonical.description = duplicate.description.clone();
    }

    let salary = &mut canonical.salary;
    let other = &duplicate.salary;
    if salary.salary_min.is_none() {
        salary.salary_min = other.salary_min;
    }
    if salary.salary_max.is_none() {
        salary.salary_max = other.salary_max;
    }
    if salary.salary_currency.is_none() {
        salary.salary_currency = other.salary_currency.clone();
    }
    if salary.salary_period.is_none() {
        salary.salary_period = other.salary_period.clone();
    }

    if canonical.posted_at.is_none() {
        canonical.posted_at = duplicate.posted_at;
    }
    if canonical.seniority_level.is_none() {
        canonical.seniority_level = duplicate.seniority_level.clone();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

/// Marks duplicates and merges their metadata into the earliest posting of each cluster.
pub fn deduplicate(postings: Vec<PostingRecord>, config: &DedupConfig) -> DedupOutcome {
    let total = postings.len();
    let mut parent: Vec<Option<usize>> = vec![None; total];

    let buckets = exact_signature_pass(&postings, config, &mut parent);
    let exact = parent.iter().filter(|p| p.is_some()).count();
    if config.enable_similarity {
        near_duplicate_pass(&postings, &buckets, config, &mut parent);
    }

    // Single stable fold in input order.
    let mut records: Vec<PostingRecord> = postings;
    let mut absorbed: HashMap<usize, (Vec<String>, Vec<String>)> = HashMap::new();
    for idx in 0..total {
        let Some(direct) = parent[idx] else {
            records[idx].canonical = true;
            records[idx].duplicate_of = None;
            continue;
        };
        let root = find_root(&parent, direct);
        let duplicate = records[idx].clone();
        merge_into(&mut records[root], &duplicate);

        let entry = absorbed.entry(root).or_default();
        entry.0.push(duplicate.id.clone());
        entry.1.extend(duplicate.provenance.iter().cloned());

        records[idx].canonical = false;
        records[idx].duplicate_of = Some(records[root].id.clone());
    }

    let assignments: Vec<PostingAssignment> = records
        .iter()
        .map(|r| PostingAssignment {
            posting_id: r.id.clone(),
            state: match &r.duplicate_of {
                Some(of) => PostingState::Duplicate { of: of.clone() },
                None => PostingState::Canonical,
            },
            provenance: r.provenance.clone(),
        })
        .collect();

    let clusters: Vec<DuplicateCluster> = (0..total)
        .filter_map(|idx| {
            absorbed.remove(&idx).map(|(ids, provenance)| DuplicateCluster {
                canonical: records[idx].clone(),
                absorbed_ids: ids,
                absorbed_provenance: provenance,
            })
        })
        .collect();

    let (canonical, duplicates): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| r.canonical);
    let duplicates_marked = duplicates.len();

    info!(
        "Dedupe: {total} postings, {} canonical, {duplicates_marked} duplicates \
         ({exact} exact, {} near)",
        canonical.len(),
        duplicates_marked - exact
    );

    DedupOutcome {
        canonical,
        duplicates,
        clusters,
        assignments,
        duplicates_marked,
    }
}
