pub mod error;
pub mod merge;
pub mod parser;
pub mod query;
pub mod record;
pub mod settings;
pub mod store;
pub mod telemetry;

pub use merge::{ingest, merge_run, IngestReport, MergeOutcome};
pub use record::{CommitInfo, GitUser, History, Measurement, RunEntry};
pub use store::{HistoryRepository, HistoryStore};

pub type BenchtrailResult<T> = Result<T, error::IngestError>;

/// Default bound on the load-merge-save retry loop when the caller does not
/// configure one. After this many `ConcurrentModification` rejections the
/// conflict is surfaced as fatal.
pub const DEFAULT_MAX_RETRIES: usize = 5;
