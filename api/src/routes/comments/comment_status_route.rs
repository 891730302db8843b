use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Response,
};
use insights::{CandidateComment, PrContext, RepoKey, comments::posted_hashes};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

/// Request body for the idempotent re-render check.
#[derive(Debug, Deserialize)]
pub struct CommentStatusRequest {
    pub org: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub pr_number: u64,
    pub comments: Vec<CandidateComment>,
}

#[derive(Debug, Serialize)]
pub struct CommentStatusResponse {
    pub posted_hashes: Vec<String>,
}

/// HTTP endpoint reporting which candidate comments are already posted, so
/// a re-rendered UI does not re-offer them. Local read, no provider call.
#[instrument(
    name = "comment_status_route",
    skip(state, body),
    fields(pr = body.pr_number, count = body.comments.len())
)]
pub async fn comment_status_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CommentStatusRequest>,
) -> Response {
    let ctx = PrContext {
        org: body.org,
        repo: RepoKey::new(body.repo_owner, body.repo_name),
        pr_number: body.pr_number,
        head_sha: None,
    };

    let hashes = posted_hashes(&state.comments, &ctx, &body.comments);
    ApiResponse::success(CommentStatusResponse {
        posted_hashes: hashes,
    })
    .into_response_with_status(StatusCode::OK)
}
