use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller, installed into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl Identity {
    pub fn role(&self) -> Option<&str> {
        self.claims.get("role").and_then(|v| v.as_str())
    }
}

/// Request admission. Accepts a bearer token from the `Authorization` header
/// or, for image tags that cannot set headers, the `token` query parameter.
/// Both go through the same validator, so revocation and rate limiting apply
/// either way.
///
/// With `AUTH_PLUGINS` enabled, validation fans out to the plugin registry
/// instead of the built-in auth core.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.config.auth_plugins && state.plugins.registry().is_empty() {
        warn!("No auth plugins registered, bypassing authentication");
        return Ok(next.run(request).await);
    }

    let token = match bearer_token(&request)? {
        Some(token) => token,
        None => query_token(&request)
            .ok_or_else(|| AppError::Unauthenticated("Authorization header required".into()))?,
    };

    let identity = if state.config.auth_plugins {
        match state.plugins.validate_token(&token).await {
            Some(user_id) => Identity {
                user_id,
                claims: serde_json::Map::new(),
            },
            None => return Err(AppError::Unauthenticated("Unauthorized".into())),
        }
    } else {
        let (user_id, claims) = state.auth.validate_token(&token)?;
        Identity { user_id, claims }
    };

    debug!(user_id = %identity.user_id, "User authenticated");

    if let Ok(value) = HeaderValue::from_str(&identity.user_id) {
        request.headers_mut().insert("x-user-id", value);
    }
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Admin gate for user-management routes. Reads the identity installed by
/// [`require_auth`]; anything but `role = "admin"` is refused.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or_else(|| AppError::Unauthenticated("Unauthorized".into()))?;

    if identity.role() != Some("admin") {
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Result<Option<String>, AppError> {
    let Some(value) = request.headers().get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Invalid Authorization header format".into()))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthenticated("Invalid Authorization header format".into()))?;

    if token.is_empty() {
        return Err(AppError::Unauthenticated("Token cannot be empty".into()));
    }

    Ok(Some(token.to_string()))
}

fn query_token(request: &Request) -> Option<String> {
    request
        .uri()
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, auth_header: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = auth_header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn bearer_token_requires_the_scheme() {
        let req = request("/api/photos", Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&req).unwrap(), Some("abc.def.ghi".into()));

        let req = request("/api/photos", Some("Basic dXNlcg=="));
        assert!(bearer_token(&req).is_err());

        let req = request("/api/photos", Some("Bearer "));
        assert!(bearer_token(&req).is_err());

        let req = request("/api/photos", None);
        assert_eq!(bearer_token(&req).unwrap(), None);
    }

    #[test]
    fn query_token_channel_parses_the_token_pair() {
        let req = request("/api/photo/abc?thumbnail=512&token=tok123", None);
        assert_eq!(query_token(&req), Some("tok123".into()));

        let req = request("/api/photo/abc?thumbnail=512", None);
        assert_eq!(query_token(&req), None);

        let req = request("/api/photo/abc?token=", None);
        assert_eq!(query_token(&req), None);
    }

    #[test]
    fn identity_role_reads_custom_claims() {
        let mut claims = serde_json::Map::new();
        claims.insert("role".into(), serde_json::json!("admin"));
        let identity = Identity {
            user_id: "u1".into(),
            claims,
        };
        assert_eq!(identity.role(), Some("admin"));

        let identity = Identity {
            user_id: "u1".into(),
            claims: serde_json::Map::new(),
        };
        assert_eq!(identity.role(), None);
    }
}
