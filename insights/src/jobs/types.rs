//! Job records and subject keys for long-running generation work.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::git_providers::RepoKey;

/// Upper bound for error messages stored on a job or comment record.
pub const MAX_ERROR_LEN: usize = 500;

/// Kind of artifact a generation job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Documentation,
    Diagram,
    PrAnalysis,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Documentation => "documentation",
            JobKind::Diagram => "diagram",
            JobKind::PrAnalysis => "pr_analysis",
        }
    }
}

/// What a job is about: organization + repository + kind, plus the PR number
/// for PR-scoped kinds. Primary key of the job store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectKey {
    pub org: String,
    pub repo: RepoKey,
    pub kind: JobKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.org, self.repo, self.kind.as_str())?;
        if let Some(pr) = self.pr_number {
            write!(f, "#{pr}")?;
        }
        Ok(())
    }
}

/// Lifecycle state of a generation job.
///
/// `Pending` and `Generating` are both "in flight" for dedup purposes; job
/// creation proceeds straight to issuing the engine call, so new jobs are
/// written as `Generating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Generating,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Generating)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }
}

/// Opaque pointer to an externally stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRef {
    pub bucket: String,
    pub object_key: String,
    pub byte_size: u64,
}

/// One generation job. Appended to per-subject history at start, mutated by
/// compare-and-set transitions only.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub subject: SubjectKey,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<ResultRef>,
    pub error: Option<String>,
    pub branch: Option<String>,
    pub requested_by: String,
}

impl GenerationJob {
    pub fn new(subject: SubjectKey, branch: Option<String>, requested_by: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject,
            status: JobStatus::Generating,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            branch,
            requested_by,
        }
    }
}

/// Truncates an upstream error message to the stored limit, char-boundary
/// safe.
pub fn truncate_error(msg: &str) -> String {
    if msg.chars().count() <= MAX_ERROR_LEN {
        return msg.to_string();
    }
    msg.chars().take(MAX_ERROR_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_messages_and_caps_long_ones() {
        assert_eq!(truncate_error("boom"), "boom");
        let long = "x".repeat(2000);
        assert_eq!(truncate_error(&long).chars().count(), MAX_ERROR_LEN);
    }

    #[test]
    fn subject_key_display_includes_pr_number_when_present() {
        let s = SubjectKey {
            org: "acme".into(),
            repo: RepoKey::new("acme", "billing"),
            kind: JobKind::PrAnalysis,
            pr_number: Some(7),
        };
        assert_eq!(s.to_string(), "acme/acme/billing/pr_analysis#7");
    }
}
