//! Keyed job store with atomic transitions.
//!
//! Single source of truth for job state. Per-subject history is append-only;
//! the newest entry is what a poll reads, older completed entries serve as
//! fallback results. All mutations happen under one lock so "insert if no
//! in-flight job" and "transition only from an expected status" are atomic:
//! a slow background completion can never clobber a staleness failure or
//! revive a cancelled job.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::jobs::types::{GenerationJob, JobStatus, ResultRef, SubjectKey};

/// Outcome of an atomic create attempt.
#[derive(Debug)]
pub enum CreateOutcome {
    /// No in-flight job existed; this one is now the newest record.
    Created(GenerationJob),
    /// An in-flight job already covers the subject; returned unchanged.
    AlreadyInFlight(GenerationJob),
}

#[derive(Default)]
pub struct JobStore {
    inner: Mutex<HashMap<SubjectKey, Vec<GenerationJob>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `job` unless an in-flight job already exists for its subject.
    /// The check and the insert happen under one lock; this is the dedup
    /// guard against duplicate expensive engine calls.
    pub fn create_in_flight(&self, job: GenerationJob) -> CreateOutcome {
        let mut map = self.inner.lock().expect("job store lock poisoned");
        let history = map.entry(job.subject.clone()).or_default();
        if let Some(existing) = history.iter().rev().find(|j| j.status.is_in_flight()) {
            return CreateOutcome::AlreadyInFlight(existing.clone());
        }
        history.push(job.clone());
        CreateOutcome::Created(job)
    }

    /// Newest job for the subject, any status.
    pub fn latest(&self, subject: &SubjectKey) -> Option<GenerationJob> {
        let map = self.inner.lock().expect("job store lock poisoned");
        map.get(subject).and_then(|h| h.last().cloned())
    }

    /// Newest in-flight job for the subject, if any.
    pub fn latest_in_flight(&self, subject: &SubjectKey) -> Option<GenerationJob> {
        let map = self.inner.lock().expect("job store lock poisoned");
        map.get(subject)
            .and_then(|h| h.iter().rev().find(|j| j.status.is_in_flight()).cloned())
    }

    /// Newest completed job for the subject; the soft-fallback source when
    /// the newest job failed.
    pub fn latest_completed(&self, subject: &SubjectKey) -> Option<GenerationJob> {
        let map = self.inner.lock().expect("job store lock poisoned");
        map.get(subject).and_then(|h| {
            h.iter()
                .rev()
                .find(|j| j.status == JobStatus::Completed)
                .cloned()
        })
    }

    /// Marks a job completed with its artifact reference. No-op unless the
    /// job is still in flight (a cancelled or stale-failed job stays failed,
    /// the late result is discarded).
    pub fn mark_completed(
        &self,
        subject: &SubjectKey,
        id: Uuid,
        result: ResultRef,
    ) -> Option<GenerationJob> {
        self.transition(subject, id, |job| {
            job.status = JobStatus::Completed;
            job.result = Some(result);
        })
    }

    /// Marks a job failed with a (pre-truncated) error message. No-op unless
    /// the job is still in flight.
    pub fn mark_failed(
        &self,
        subject: &SubjectKey,
        id: Uuid,
        error: String,
    ) -> Option<GenerationJob> {
        self.transition(subject, id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
        })
    }

    /// Cancels whatever job is currently in flight for the subject.
    pub fn cancel_in_flight(&self, subject: &SubjectKey) -> Option<GenerationJob> {
        let mut map = self.inner.lock().expect("job store lock poisoned");
        let history = map.get_mut(subject)?;
        let job = history.iter_mut().rev().find(|j| j.status.is_in_flight())?;
        job.status = JobStatus::Cancelled;
        job.updated_at = Utc::now();
        Some(job.clone())
    }

    /// Compare-and-set transition: applies `apply` only while the job is in
    /// flight. Returns the updated record, or `None` when the precondition
    /// failed (terminal state already written elsewhere).
    fn transition(
        &self,
        subject: &SubjectKey,
        id: Uuid,
        apply: impl FnOnce(&mut GenerationJob),
    ) -> Option<GenerationJob> {
        let mut map = self.inner.lock().expect("job store lock poisoned");
        let history = map.get_mut(subject)?;
        let job = history.iter_mut().rev().find(|j| j.id == id)?;
        if !job.status.is_in_flight() {
            return None;
        }
        apply(job);
        job.updated_at = Utc::now();
        Some(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::git_providers::RepoKey;
    use crate::jobs::types::JobKind;

    fn subject() -> SubjectKey {
        SubjectKey {
            org: "acme".into(),
            repo: RepoKey::new("acme", "billing"),
            kind: JobKind::Documentation,
            pr_number: None,
        }
    }

    fn job() -> GenerationJob {
        GenerationJob::new(subject(), Some("main".into()), "bob".into())
    }

    fn result_ref() -> ResultRef {
        ResultRef {
            bucket: "artifacts".into(),
            object_key: "docs/acme.json".into(),
            byte_size: 1024,
        }
    }

    #[test]
    fn second_create_is_deduped_against_in_flight_job() {
        let store = JobStore::new();
        let first = match store.create_in_flight(job()) {
            CreateOutcome::Created(j) => j,
            CreateOutcome::AlreadyInFlight(_) => panic!("first create must succeed"),
        };
        match store.create_in_flight(job()) {
            CreateOutcome::AlreadyInFlight(j) => assert_eq!(j.id, first.id),
            CreateOutcome::Created(_) => panic!("dedup guard failed"),
        }
    }

    #[test]
    fn create_succeeds_again_after_terminal_state() {
        let store = JobStore::new();
        let CreateOutcome::Created(first) = store.create_in_flight(job()) else {
            panic!("first create must succeed");
        };
        store
            .mark_failed(&subject(), first.id, "boom".into())
            .unwrap();
        assert!(matches!(
            store.create_in_flight(job()),
            CreateOutcome::Created(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_creates_produce_exactly_one_job() {
        let store = Arc::new(JobStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                matches!(store.create_in_flight(job()), CreateOutcome::Created(_))
            }));
        }
        let mut created = 0;
        for h in handles {
            if h.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[test]
    fn late_completion_cannot_revive_a_cancelled_job() {
        let store = JobStore::new();
        let CreateOutcome::Created(j) = store.create_in_flight(job()) else {
            panic!("create failed");
        };
        store.cancel_in_flight(&subject()).unwrap();

        // Background continuation resolves afterwards; its write is a no-op.
        assert!(store.mark_completed(&subject(), j.id, result_ref()).is_none());
        assert_eq!(
            store.latest(&subject()).unwrap().status,
            JobStatus::Cancelled
        );
    }

    #[test]
    fn latest_completed_survives_a_newer_failure() {
        let store = JobStore::new();
        let CreateOutcome::Created(first) = store.create_in_flight(job()) else {
            panic!("create failed");
        };
        store
            .mark_completed(&subject(), first.id, result_ref())
            .unwrap();

        let CreateOutcome::Created(second) = store.create_in_flight(job()) else {
            panic!("create failed");
        };
        store
            .mark_failed(&subject(), second.id, "engine down".into())
            .unwrap();

        assert_eq!(store.latest(&subject()).unwrap().id, second.id);
        assert_eq!(store.latest_completed(&subject()).unwrap().id, first.id);
    }
}
