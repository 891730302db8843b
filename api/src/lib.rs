use std::{error::Error, sync::Arc};

mod core;
mod routes;

use axum::{
    Router,
    routing::{get, post, put},
};
use tokio::signal;
use tracing::info;

use crate::core::app_state::AppState;
use crate::routes::{
    comments::{
        comment_status_route::comment_status_route, submit_comments_route::submit_comments_route,
    },
    directory::{
        detach_attachment_route::detach_attachment_route,
        upsert_attachment_route::upsert_attachment_route,
        upsert_connection_route::upsert_connection_route,
    },
    jobs::{
        cancel_job_route::cancel_job_route, job_status_route::job_status_route,
        start_job_route::start_job_route,
    },
};

pub async fn start() -> Result<(), Box<dyn Error>> {
    let state = Arc::new(AppState::from_env()?);

    let app = Router::new()
        .route("/jobs/start", post(start_job_route))
        .route("/jobs/status", get(job_status_route))
        .route("/jobs/cancel", post(cancel_job_route))
        .route("/comments/submit", post(submit_comments_route))
        .route("/comments/status", post(comment_status_route))
        .route("/internal/connections", put(upsert_connection_route))
        .route(
            "/internal/attachments",
            put(upsert_attachment_route).delete(detach_attachment_route),
        )
        .with_state(Arc::clone(&state));

    // Bind to address
    let listener = tokio::net::TcpListener::bind(&state.bind_addr).await?;
    info!("listening on {}", state.bind_addr);

    // Start server with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Returns a future that resolves when Ctrl+C is pressed
async fn shutdown_signal() {
    // Wait for the Ctrl+C signal
    signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
}
