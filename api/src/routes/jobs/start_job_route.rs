use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Response,
};
use insights::{EngineRequest, JobKind, JobStatus, RepoKey, StartParams, SubjectKey};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::{app_state::AppState, auth::resolve_for, http::response_envelope::ApiResponse};

/// Request body for starting a generation job.
#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub org: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub kind: JobKind,
    #[serde(default)]
    pub pr_number: Option<u64>,
    #[serde(default)]
    pub branch: Option<String>,
    pub requesting_user_id: String,
}

/// Response body returned immediately after scheduling (or deduping) a job.
#[derive(Debug, Serialize)]
pub struct StartJobResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// HTTP endpoint for starting a generation job.
///
/// Returns `generating` immediately; the engine call runs on a detached task
/// and its outcome is only visible via the status endpoint. A job already in
/// flight for the same subject is returned unchanged, with no new call.
#[instrument(name = "start_job_route", skip(state, body))]
pub async fn start_job_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartJobRequest>,
) -> Response {
    let repo = RepoKey::new(body.repo_owner, body.repo_name);
    let subject = SubjectKey {
        org: body.org.clone(),
        repo: repo.clone(),
        kind: body.kind,
        pr_number: body.pr_number,
    };

    // Cheap dedup read first: an in-flight job short-circuits before any
    // credential work.
    if let Some(existing) = state.jobs.store().latest_in_flight(&subject) {
        return ApiResponse::success(StartJobResponse {
            job_id: existing.id.to_string(),
            status: existing.status,
        })
        .into_response_with_status(StatusCode::OK);
    }

    let resolved = match resolve_for(&state, &body.requesting_user_id, &body.org, &repo).await {
        Ok(resolved) => resolved,
        Err(e) => {
            return ApiResponse::<()>::error("NO_PROVIDER_ACCESS", e.to_string())
                .into_response_with_status(StatusCode::FORBIDDEN);
        }
    };

    info!(subject = %subject, tier = ?resolved.tier, "credentials resolved, scheduling job");

    let req = EngineRequest {
        access_token: resolved.token,
        organization: body.org,
        repo: repo.full_name(),
        kind: body.kind,
        branch: body.branch.clone(),
        pr_number: body.pr_number,
        scope: None,
    };
    let engine = state.engine.clone();
    let outcome = state.jobs.start(
        subject,
        StartParams {
            branch: body.branch,
            requested_by: body.requesting_user_id,
        },
        async move { engine.generate(&req).await },
    );

    let job = outcome.job();
    ApiResponse::success(StartJobResponse {
        job_id: job.id.to_string(),
        status: job.status,
    })
    .into_response_with_status(StatusCode::OK)
}
