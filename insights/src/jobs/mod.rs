//! Generation-job lifecycle: records, keyed store, orchestrator.

pub mod orchestrator;
pub mod store;
pub mod types;

pub use orchestrator::{
    FallbackResult, JobOrchestrator, STALE_AFTER, StartOutcome, StartParams, StatusReport,
};
pub use store::{CreateOutcome, JobStore};
pub use types::{
    GenerationJob, JobKind, JobStatus, MAX_ERROR_LEN, ResultRef, SubjectKey, truncate_error,
};
