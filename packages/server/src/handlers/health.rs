use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Liveness probe, outside the API prefix.
pub async fn healthz() -> &'static str {
    "pixie core"
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Auth",
    operation_id = "authHealth",
    summary = "Auth core health",
    responses(
        (status = 200, description = "Auth service healthy"),
        (status = 503, description = "Auth service unhealthy"),
    ),
)]
pub async fn auth_health(State(state): State<AppState>) -> Response {
    match state.auth.health_check() {
        Ok(()) => (StatusCode::OK, "Auth service healthy").into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Auth service unhealthy: {e}"),
        )
            .into_response(),
    }
}
