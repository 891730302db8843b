use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Response,
};
use insights::{CandidateComment, PrContext, RepoKey, SubmitReport, comments::submit_comments};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::core::{app_state::AppState, auth::resolve_for, http::response_envelope::ApiResponse};

/// Request body for submitting a batch of generated review comments.
#[derive(Debug, Deserialize)]
pub struct SubmitCommentsRequest {
    pub org: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub pr_number: u64,
    pub requesting_user_id: String,
    pub comments: Vec<CandidateComment>,
}

/// HTTP endpoint for posting accepted review comments onto a PR.
///
/// Per-comment failures are reported in the result list, never as a batch
/// error; re-submitting identical content is idempotent via content-hash
/// records.
#[instrument(
    name = "submit_comments_route",
    skip(state, body),
    fields(pr = body.pr_number, count = body.comments.len())
)]
pub async fn submit_comments_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitCommentsRequest>,
) -> Response {
    let repo = RepoKey::new(body.repo_owner, body.repo_name);

    let resolved = match resolve_for(&state, &body.requesting_user_id, &body.org, &repo).await {
        Ok(resolved) => resolved,
        Err(e) => {
            return ApiResponse::<()>::error("NO_PROVIDER_ACCESS", e.to_string())
                .into_response_with_status(StatusCode::FORBIDDEN);
        }
    };

    // Missing head SHA only disables anchoring; comments still post as
    // general notes.
    let head_sha = match state
        .github
        .get_pull(&resolved.token, &repo, body.pr_number)
        .await
    {
        Ok(pr) => Some(pr.head_sha),
        Err(e) => {
            warn!(pr = body.pr_number, "PR meta fetch failed, posting general comments: {e}");
            None
        }
    };

    let ctx = PrContext {
        org: body.org,
        repo,
        pr_number: body.pr_number,
        head_sha,
    };
    let report: SubmitReport = submit_comments(
        &state.github,
        &state.comments,
        &ctx,
        &resolved.token,
        &body.comments,
    )
    .await;

    ApiResponse::success(report).into_response_with_status(StatusCode::OK)
}
