use super::AppState;
use crate::api::models::{HealthResponse, HealthStatus};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

/// Handler for GET /health
///
/// Probes the active backend with a cheap user lookup. The browser-local
/// backend has no server-side store and always reports healthy.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = state.provider.backend_kind().await;

    let (status, message) = match state.provider.check_user_exist("__health__").await {
        Ok(_) => (HealthStatus::Healthy, None),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (HealthStatus::Unhealthy, Some(e.to_string()))
        }
    };

    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(HealthResponse {
            status,
            storage,
            message,
            version: crate::VERSION,
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}
