use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use common::photos::StoreError;
use common::storage::StorageError;

use crate::auth::AuthError;
use crate::users::UserError;

/// Structured error response body.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Application-level error taxonomy. Handlers translate adapter errors into
/// these at the HTTP boundary; 5xx bodies stay generic with detail in logs.
#[derive(Debug)]
pub enum AppError {
    BadInput(String),
    Unauthenticated(String),
    InvalidCredentials,
    Forbidden,
    NotFound(String),
    Conflict(String),
    RateLimited,
    Transient(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::BadInput(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::Unauthenticated(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "UNAUTHENTICATED",
                    message: msg,
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: "Invalid credentials".into(),
                },
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    code: "RATE_LIMITED",
                    message: "Too many requests".into(),
                },
            ),
            AppError::Transient(detail) => {
                tracing::warn!("Upstream error: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        code: "UPSTREAM_UNAVAILABLE",
                        message: "A backing service is unavailable".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("photo not found: {id}")),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Database(e) => AppError::Internal(format!("database error: {e}")),
            StoreError::Decode(msg) => AppError::Internal(format!("row decode error: {msg}")),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("object not found: {key}")),
            StorageError::Transport(msg) => AppError::Transient(msg),
            StorageError::Auth(msg) => AppError::Internal(format!("storage auth error: {msg}")),
            StorageError::Other(msg) => AppError::Internal(format!("storage error: {msg}")),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::RateLimited => AppError::RateLimited,
            AuthError::Expired => AppError::Unauthenticated("Token expired".into()),
            AuthError::Revoked => AppError::Unauthenticated("Token revoked".into()),
            AuthError::Invalid => AppError::Unauthenticated("Invalid token".into()),
            AuthError::Signing(msg) | AuthError::Config(msg) => AppError::Internal(msg),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidCredentials => AppError::InvalidCredentials,
            UserError::Inactive => AppError::Forbidden,
            UserError::NotFound => AppError::NotFound("User not found".into()),
            UserError::AlreadyExists => AppError::Conflict("User already exists".into()),
            UserError::LastAdmin => {
                AppError::BadInput("Cannot delete the last admin user".into())
            }
            UserError::Store(e) => AppError::Internal(format!("user store error: {e}")),
            UserError::Hash(msg) => AppError::Internal(format!("password hash error: {msg}")),
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Internal(format!("database error: {err}"))
    }
}
