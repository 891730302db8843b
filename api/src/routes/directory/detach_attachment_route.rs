use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Response,
};
use insights::RepoKey;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct DetachAttachmentRequest {
    pub org: String,
    pub repo_owner: String,
    pub repo_name: String,
}

#[derive(Debug, Serialize)]
pub struct DetachAck {
    pub detached: bool,
}

/// Internal endpoint: detach a repository from its organization. Posted
/// comment records for the repository are torn down with it, so a later
/// re-attach starts from a clean idempotency slate.
#[instrument(name = "detach_attachment_route", skip(state, body))]
pub async fn detach_attachment_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DetachAttachmentRequest>,
) -> Response {
    let repo = RepoKey::new(body.repo_owner, body.repo_name);

    let removed = state.directory.remove_attachment(&body.org, &repo);
    state.comments.remove_repo(&body.org, &repo);
    if removed.is_some() {
        info!(org = %body.org, repo = %repo, "repository detached");
    }

    ApiResponse::success(DetachAck {
        detached: removed.is_some(),
    })
    .into_response_with_status(StatusCode::OK)
}
