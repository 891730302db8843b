//! Core subsystem for requesting long-running AI-generated repository
//! artifacts (documentation, structure diagrams, PR analysis) from an
//! external analysis engine, safely, out of short-lived web requests.
//!
//! Three pieces carry the weight, exercised together whenever a repository
//! operation needs both an authorized provider call and a correctly anchored
//! result:
//!
//! 1) **Job lifecycle** (`jobs`)
//!    - Atomic dedup: at most one in-flight job per subject key
//!    - Engine call detached onto its own task; terminal state written by the
//!      call's continuation, not by any client connection
//!    - Poll-time staleness healing and last-good-result fallback
//!
//! 2) **Tiered credential resolution** (`credentials`, `directory`)
//!    - Requester → repository attacher → organization owner
//!    - Live HTTP probe against the target repository for the first two tiers
//!
//! 3) **Diff-position anchoring** (`diffpos`, `comments`)
//!    - Unified-diff scan to the provider's cumulative comment position
//!    - Nearest-hunk fallback, then general-comment degradation
//!    - Content-hash idempotent outcome records per comment
//!
//! The crate uses `tracing` for debug logging and avoids `async-trait` and
//! heap trait objects (no `Box<dyn ...>`). It relies on plain `async fn`,
//! generic closures at the two injection seams (live credential probe, engine
//! call) and concrete clients elsewhere.

pub mod comments;
pub mod credentials;
pub mod diffpos;
pub mod directory;
pub mod engine;
pub mod errors;
pub mod git_providers;
pub mod jobs;

// -----------------------------------------------------------------------------
// Convenience re-exports for downstream users
// -----------------------------------------------------------------------------

pub use comments::{CandidateComment, CommentStore, PrContext, SubmitReport};
pub use credentials::{CandidateSet, ProviderConnection, ResolvedToken, TokenTier, resolve_token};
pub use diffpos::{ResolvedPosition, resolve_position};
pub use directory::{Directory, RepoAttachment};
pub use engine::{ENGINE_CALL_TIMEOUT, EngineClient, EngineConfig, EngineRequest};
pub use errors::{Error, InsightResult};
pub use git_providers::{CommentSide, GitHubClient, ProviderConfig, RepoKey};
pub use jobs::{
    GenerationJob, JobKind, JobOrchestrator, JobStatus, JobStore, ResultRef, STALE_AFTER,
    StartOutcome, StartParams, StatusReport, SubjectKey,
};
