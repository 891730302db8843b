//! Generation-job orchestrator.
//!
//! `start` deduplicates against in-flight work, writes the job record and
//! detaches the engine call onto its own task; the task owns writing the
//! terminal state and outlives the originating request's connection.
//! `status` is the read path: it heals jobs whose worker died silently (the
//! staleness check) and falls back to the last good result when the newest
//! attempt failed.
//!
//! The engine call arrives as a plain future, so the orchestrator never
//! touches HTTP itself and tests can inject arbitrary call behavior.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::Error;
use crate::jobs::store::{CreateOutcome, JobStore};
use crate::jobs::types::{GenerationJob, JobStatus, ResultRef, SubjectKey, truncate_error};

/// Poll-time staleness window: a job still in flight after this long is
/// declared dead and force-failed. Must stay above the engine call timeout
/// (`engine::ENGINE_CALL_TIMEOUT`) so the two mechanisms agree on what "too
/// long" means.
pub const STALE_AFTER: Duration = Duration::from_secs(45 * 60);

/// Caller-supplied job parameters.
#[derive(Debug, Clone)]
pub struct StartParams {
    pub branch: Option<String>,
    pub requested_by: String,
}

/// Outcome of a start request.
#[derive(Debug)]
pub enum StartOutcome {
    /// A new job was created and its engine call detached.
    Started(GenerationJob),
    /// An in-flight job already covers the subject; no call was issued.
    AlreadyRunning(GenerationJob),
}

impl StartOutcome {
    pub fn job(&self) -> &GenerationJob {
        match self {
            StartOutcome::Started(j) | StartOutcome::AlreadyRunning(j) => j,
        }
    }
}

/// Older completed result returned alongside a failure indicator.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackResult {
    pub job_id: Uuid,
    pub result: ResultRef,
    pub completed_at: DateTime<Utc>,
}

/// What a status poll reports. Always terminal-or-progressing, never an
/// indefinite hang: stale jobs are failed before this is built.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result: Option<ResultRef>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    /// Present when `status` is failed/cancelled and an older completed job
    /// exists: callers should show the previous good artifact, not nothing.
    pub fallback: Option<FallbackResult>,
}

pub struct JobOrchestrator {
    store: Arc<JobStore>,
    stale_after: Duration,
}

impl JobOrchestrator {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self {
            store,
            stale_after: STALE_AFTER,
        }
    }

    /// Overrides the staleness window; test hook.
    pub fn with_stale_after(store: Arc<JobStore>, stale_after: Duration) -> Self {
        Self { store, stale_after }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Starts a generation job unless one is already in flight.
    ///
    /// `call` is the prepared engine invocation; it is awaited on a detached
    /// task whose lifetime is tied to the job, not to the caller. The caller
    /// gets the `Generating` record back immediately.
    pub fn start<F>(&self, subject: SubjectKey, params: StartParams, call: F) -> StartOutcome
    where
        F: Future<Output = Result<ResultRef, Error>> + Send + 'static,
    {
        let job = GenerationJob::new(subject.clone(), params.branch, params.requested_by);
        match self.store.create_in_flight(job) {
            CreateOutcome::AlreadyInFlight(existing) => {
                debug!(subject = %subject, job = %existing.id, "start deduped against in-flight job");
                StartOutcome::AlreadyRunning(existing)
            }
            CreateOutcome::Created(created) => {
                info!(subject = %subject, job = %created.id, "job started");
                let store = Arc::clone(&self.store);
                let id = created.id;
                tokio::spawn(async move {
                    match call.await {
                        Ok(result) => {
                            if store.mark_completed(&subject, id, result).is_none() {
                                debug!(subject = %subject, job = %id,
                                    "job already terminal, engine result discarded");
                            } else {
                                info!(subject = %subject, job = %id, "job completed");
                            }
                        }
                        Err(e) => {
                            let msg = truncate_error(&e.to_string());
                            if store.mark_failed(&subject, id, msg).is_none() {
                                debug!(subject = %subject, job = %id,
                                    "job already terminal, engine error discarded");
                            } else {
                                warn!(subject = %subject, job = %id, "job failed: {e}");
                            }
                        }
                    }
                });
                StartOutcome::Started(created)
            }
        }
    }

    /// Reads the newest job for the subject.
    ///
    /// An in-flight job older than the staleness window is proof the
    /// background worker died without writing a terminal state; it is failed
    /// in place (idempotently, via the store's compare-and-set) before the
    /// report is built.
    pub fn status(&self, subject: &SubjectKey) -> Option<StatusReport> {
        let mut job = self.store.latest(subject)?;

        if job.status.is_in_flight() {
            let age = (Utc::now() - job.created_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if age >= self.stale_after {
                warn!(subject = %subject, job = %job.id, age_secs = age.as_secs(),
                    "in-flight job exceeded staleness window, failing it");
                let msg = format!(
                    "generation timed out after {} minutes",
                    age.as_secs() / 60
                );
                job = match self.store.mark_failed(subject, job.id, msg) {
                    Some(updated) => updated,
                    // Lost a race against a concurrent terminal write; the
                    // store kept whichever landed first.
                    None => self.store.latest(subject)?,
                };
            }
        }

        let fallback = match job.status {
            JobStatus::Failed | JobStatus::Cancelled => self
                .store
                .latest_completed(subject)
                .filter(|c| c.id != job.id)
                .and_then(|c| {
                    c.result.clone().map(|result| FallbackResult {
                        job_id: c.id,
                        result,
                        completed_at: c.updated_at,
                    })
                }),
            _ => None,
        };

        let elapsed = if job.status.is_terminal() {
            job.updated_at - job.created_at
        } else {
            Utc::now() - job.created_at
        };

        Some(StatusReport {
            job_id: job.id,
            status: job.status,
            result: job.result.clone(),
            error: job.error.clone(),
            started_at: job.created_at,
            elapsed_ms: elapsed.num_milliseconds(),
            fallback,
        })
    }

    /// Marks the subject's in-flight job cancelled. The engine may keep
    /// running remotely; its eventual write is discarded by the store.
    pub fn cancel(&self, subject: &SubjectKey) -> Option<GenerationJob> {
        let cancelled = self.store.cancel_in_flight(subject);
        if let Some(job) = &cancelled {
            info!(subject = %subject, job = %job.id, "job cancelled");
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::errors::EngineError;
    use crate::git_providers::RepoKey;
    use crate::jobs::types::{JobKind, MAX_ERROR_LEN};

    fn subject() -> SubjectKey {
        SubjectKey {
            org: "acme".into(),
            repo: RepoKey::new("acme", "billing"),
            kind: JobKind::Diagram,
            pr_number: None,
        }
    }

    fn params() -> StartParams {
        StartParams {
            branch: Some("main".into()),
            requested_by: "bob".into(),
        }
    }

    fn result_ref() -> ResultRef {
        ResultRef {
            bucket: "artifacts".into(),
            object_key: "diagram/acme.json".into(),
            byte_size: 64,
        }
    }

    async fn poll_until_terminal(orch: &JobOrchestrator, subject: &SubjectKey) -> StatusReport {
        for _ in 0..100 {
            let report = orch.status(subject).expect("job must exist");
            if report.status.is_terminal() {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn rapid_double_start_issues_one_engine_call() {
        let orch = JobOrchestrator::new(Arc::new(JobStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            orch.start(subject(), params(), async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(result_ref())
            });
        }

        poll_until_terminal(&orch, &subject()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn engine_success_completes_the_job_with_result_ref() {
        let orch = JobOrchestrator::new(Arc::new(JobStore::new()));
        let outcome = orch.start(subject(), params(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(result_ref())
        });
        assert_eq!(outcome.job().status, JobStatus::Generating);

        let report = poll_until_terminal(&orch, &subject()).await;
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.result.unwrap(), result_ref());
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn engine_failure_records_truncated_error_and_fallback() {
        let store = Arc::new(JobStore::new());
        let orch = JobOrchestrator::new(Arc::clone(&store));

        // A previously completed job to fall back on.
        orch.start(subject(), params(), async { Ok(result_ref()) });
        let good = poll_until_terminal(&orch, &subject()).await;
        assert_eq!(good.status, JobStatus::Completed);

        let huge = "e".repeat(3000);
        orch.start(subject(), params(), async move {
            Err(Error::Engine(EngineError::Reported(huge)))
        });
        let report = poll_until_terminal(&orch, &subject()).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.error.as_ref().unwrap().chars().count() <= MAX_ERROR_LEN);
        let fallback = report.fallback.expect("previous good result expected");
        assert_eq!(fallback.result, result_ref());
    }

    #[tokio::test]
    async fn stale_job_is_failed_on_poll_and_stays_failed() {
        let store = Arc::new(JobStore::new());
        let orch = JobOrchestrator::with_stale_after(Arc::clone(&store), Duration::from_millis(0));

        // Engine call that never resolves within the test.
        orch.start(subject(), params(), async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(result_ref())
        });

        let first = orch.status(&subject()).unwrap();
        assert_eq!(first.status, JobStatus::Failed);
        assert!(first.error.as_ref().unwrap().contains("timed out"));

        // Repeated polls are idempotent: same terminal job, no re-trigger.
        let second = orch.status(&subject()).unwrap();
        assert_eq!(second.status, JobStatus::Failed);
        assert_eq!(second.job_id, first.job_id);
        assert_eq!(second.error, first.error);
    }

    #[tokio::test]
    async fn cancel_discards_the_late_engine_result() {
        let orch = JobOrchestrator::new(Arc::new(JobStore::new()));
        orch.start(subject(), params(), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(result_ref())
        });

        let cancelled = orch.cancel(&subject()).expect("in-flight job expected");
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        // Give the detached task time to resolve and attempt its write.
        tokio::time::sleep(Duration::from_millis(80)).await;
        let report = orch.status(&subject()).unwrap();
        assert_eq!(report.status, JobStatus::Cancelled);
        assert!(report.result.is_none());
    }
}
