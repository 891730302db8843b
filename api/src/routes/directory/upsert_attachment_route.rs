use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Response,
};
use insights::RepoAttachment;
use serde::Serialize;
use tracing::instrument;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Serialize)]
pub struct UpsertAck {
    pub ok: bool,
}

/// Internal endpoint: register or replace a repository attachment
/// (who attached it, who owns the organization).
#[instrument(name = "upsert_attachment_route", skip(state, body), fields(repo = %body.repo))]
pub async fn upsert_attachment_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RepoAttachment>,
) -> Response {
    state.directory.upsert_attachment(body);
    ApiResponse::success(UpsertAck { ok: true }).into_response_with_status(StatusCode::OK)
}
