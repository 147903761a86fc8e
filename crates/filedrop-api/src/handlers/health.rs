use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

/// Key probed by the readiness check; it never names a real object.
const PROBE_KEY: &str = "health-check-probe";

/// Run an async check with timeout; returns "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// Liveness
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        storage: None,
        backend: None,
    })
}

/// Readiness: the storage backend answers.
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    const TIMEOUT: Duration = Duration::from_secs(5);

    let storage = state.storage.clone();
    let storage_status = run_check(
        TIMEOUT,
        async move { storage.exists(PROBE_KEY).await.map(drop) },
        "unhealthy",
    )
    .await;

    let healthy = storage_status == "healthy";
    let status = if healthy {
        StatusCode::OK
    } else {
        tracing::warn!(storage = %storage_status, "Readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            storage: Some(storage_status),
            backend: Some(state.storage.backend_type().to_string()),
        }),
    )
}
