use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::models::auth::{
    LoginRequest, LoginResponse, RecreateAdminResponse, RevokeRequest, TokenRequest, TokenResponse,
};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/token",
    tag = "Auth",
    operation_id = "generateToken",
    summary = "Mint a token for an arbitrary subject",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token minted", body = TokenResponse),
        (status = 400, description = "Missing subject (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn generate_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    if payload.subject.is_empty() {
        return Err(AppError::BadInput("Subject is required".into()));
    }

    let token = state
        .auth
        .generate_token(&payload.subject, payload.custom_claims.unwrap_or_default())?;

    Ok(Json(TokenResponse { token }))
}

#[utoipa::path(
    post,
    path = "/revoke",
    tag = "Auth",
    operation_id = "revokeToken",
    summary = "Revoke a token for the remainder of its lifetime",
    request_body = RevokeRequest,
    responses(
        (status = 204, description = "Token revoked"),
        (status = 400, description = "Missing token (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    if payload.token.is_empty() {
        return Err(AppError::BadInput("Token is required".into()));
    }

    state.auth.revoke_token(&payload.token);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Log in with username and password",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Invalid credentials (INVALID_CREDENTIALS)", body = ErrorBody),
        (status = 403, description = "Account inactive (PERMISSION_DENIED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadInput(
            "Username and password are required".into(),
        ));
    }

    let user = state
        .users
        .authenticate(&payload.username, &payload.password)
        .await?;

    let mut custom = serde_json::Map::new();
    custom.insert("role".into(), json!(user.role.as_str()));
    custom.insert("username".into(), json!(user.username.clone()));
    custom.insert(
        "full_name".into(),
        json!(user.full_name.clone().unwrap_or_default()),
    );

    let token = state.auth.generate_token(&user.id.to_string(), custom)?;

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/recreate-admin",
    tag = "Auth",
    operation_id = "recreateAdmin",
    summary = "Break-glass: reset the admin account to default credentials",
    description = "Unauthenticated recovery endpoint. Gate it by network position \
        and disable it in hardened deployments.",
    responses(
        (status = 200, description = "Admin recreated", body = RecreateAdminResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn recreate_admin(
    State(state): State<AppState>,
) -> Result<Json<RecreateAdminResponse>, AppError> {
    tracing::info!("Recreate admin user request received");
    state.users.recreate_admin().await?;

    Ok(Json(RecreateAdminResponse {
        success: true,
        message: "Admin user recreated successfully. Default credentials have been set.".into(),
    }))
}
