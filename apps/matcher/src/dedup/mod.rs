// Duplicate and near-duplicate detection over a posting set.
// Decisions are made first; the fold/merge always runs as one input-ordered pass.

pub mod cluster;
pub mod signature;
pub mod similarity;

pub use cluster::{
    deduplicate, DedupConfig, DedupOutcome, DuplicateCluster, PostingAssignment, PostingState,
};
pub use signature::{bucket_key, normalize_field, signature};
pub use similarity::{description_jaccard, title_ratio};
