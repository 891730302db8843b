use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use chrono::{DateTime, Utc};
use insights::{JobKind, JobStatus, RepoKey, ResultRef, SubjectKey};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

/// Query parameters identifying the polled subject.
#[derive(Debug, Deserialize)]
pub struct JobStatusQuery {
    pub org: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub kind: JobKind,
    #[serde(default)]
    pub pr_number: Option<u64>,
}

/// Older good result returned alongside a failure.
#[derive(Debug, Serialize)]
pub struct FallbackPayload {
    pub job_id: String,
    pub completed_at: DateTime<Utc>,
    pub result_ref: ResultRef,
    /// Dereferenced artifact; absent when the fetch failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<ResultRef>,
    /// Dereferenced artifact for a completed job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackPayload>,
}

/// HTTP endpoint for polling a generation job.
///
/// Always answers with a terminal-or-progressing state: the orchestrator
/// fails stale jobs before reporting, and a failed newest attempt is
/// accompanied by the last good artifact when one exists.
#[instrument(name = "job_status_route", skip(state, q))]
pub async fn job_status_route(
    State(state): State<Arc<AppState>>,
    Query(q): Query<JobStatusQuery>,
) -> Response {
    let subject = SubjectKey {
        org: q.org,
        repo: RepoKey::new(q.repo_owner, q.repo_name),
        kind: q.kind,
        pr_number: q.pr_number,
    };

    let Some(report) = state.jobs.status(&subject) else {
        return ApiResponse::<()>::error("JOB_NOT_FOUND", format!("no job for {subject}"))
            .into_response_with_status(StatusCode::NOT_FOUND);
    };

    // Completed artifacts are stored by reference; dereference before
    // returning so callers get content, not a pointer.
    let mut result = None;
    if report.status == JobStatus::Completed {
        if let Some(rref) = &report.result {
            match state.engine.fetch_artifact(rref).await {
                Ok(value) => result = Some(value),
                Err(e) => {
                    return ApiResponse::<()>::error(
                        "ARTIFACT_FETCH_FAILED",
                        format!("artifact dereference failed: {e}"),
                    )
                    .into_response_with_status(StatusCode::BAD_GATEWAY);
                }
            }
        }
    }

    // Fallback artifact is best-effort: a broken fallback never masks the
    // primary failure answer.
    let mut fallback = None;
    if let Some(fb) = &report.fallback {
        let fetched = match state.engine.fetch_artifact(&fb.result).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(subject = %subject, "fallback artifact dereference failed: {e}");
                None
            }
        };
        fallback = Some(FallbackPayload {
            job_id: fb.job_id.to_string(),
            completed_at: fb.completed_at,
            result_ref: fb.result.clone(),
            result: fetched,
        });
    }

    ApiResponse::success(JobStatusResponse {
        job_id: report.job_id.to_string(),
        status: report.status,
        result_ref: report.result,
        result,
        error: report.error,
        started_at: report.started_at,
        elapsed_ms: report.elapsed_ms,
        fallback,
    })
    .into_response_with_status(StatusCode::OK)
}
