// Batch scoring: parallel extraction/enrichment, then sequential weighting,
// scoring and persistence in input order.

pub mod batch;
pub mod sink;

pub use batch::{run_batch, BatchContext, BatchReport, BatchSummary, CancelFlag, PostingOutcome};
pub use sink::{JsonlSink, MemorySink, ScoreSink, ScoredPosting};
