use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::Response,
};
use insights::ProviderConnection;
use serde::Serialize;
use tracing::instrument;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Serialize)]
pub struct UpsertAck {
    pub ok: bool,
}

/// Internal endpoint: register or replace a user's provider connection.
/// Platform-side seeding surface; not exposed to end users.
#[instrument(name = "upsert_connection_route", skip(state, body), fields(user = %body.user_id))]
pub async fn upsert_connection_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProviderConnection>,
) -> Response {
    state.directory.upsert_connection(body);
    ApiResponse::success(UpsertAck { ok: true }).into_response_with_status(StatusCode::OK)
}
