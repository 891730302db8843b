use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Response,
};
use insights::{JobKind, RepoKey, SubjectKey};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct CancelJobRequest {
    pub org: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub kind: JobKind,
    #[serde(default)]
    pub pr_number: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// HTTP endpoint for cancelling an in-flight generation job.
///
/// The remote engine call may keep running; its eventual result is discarded
/// on write since the job record already holds a terminal state.
#[instrument(name = "cancel_job_route", skip(state, body))]
pub async fn cancel_job_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CancelJobRequest>,
) -> Response {
    let subject = SubjectKey {
        org: body.org,
        repo: RepoKey::new(body.repo_owner, body.repo_name),
        kind: body.kind,
        pr_number: body.pr_number,
    };

    let cancelled = state.jobs.cancel(&subject);
    ApiResponse::success(CancelJobResponse {
        cancelled: cancelled.is_some(),
        job_id: cancelled.map(|j| j.id.to_string()),
    })
    .into_response_with_status(StatusCode::OK)
}
