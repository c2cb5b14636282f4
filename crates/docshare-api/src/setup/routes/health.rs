//! Health check handlers.

use crate::constants::SERVICE_NAME;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "ready", "timeout", or "not_ready: {error}".
async fn run_check<F, E>(timeout: Duration, f: F) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "ready".to_string(),
        Ok(Err(e)) => format!("not_ready: {}", e),
        Err(_) => "timeout".to_string(),
    }
}

/// Liveness probe - process is running.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is alive"))
)]
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "healthy", "service": SERVICE_NAME })),
    )
}

/// Readiness probe - metadata store and blob store reachable.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Dependencies reachable"),
        (status = 503, description = "A dependency is unavailable")
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metadata = run_check(CHECK_TIMEOUT, state.files.check_metadata()).await;
    let storage = run_check(CHECK_TIMEOUT, state.files.check_storage()).await;

    let ready = metadata == "ready" && storage == "ready";
    if !ready {
        tracing::error!(metadata = %metadata, storage = %storage, "Readiness check failed");
    }

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "metadata": metadata,
            "storage": storage,
        })),
    )
}
