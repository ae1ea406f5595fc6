use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::rate_limit::RateLimiter;
use super::revocation::RevocationSet;
use crate::config::AppConfig;

/// Fallback eviction deadline for revoked tokens whose expiry cannot be read.
const REVOKE_FALLBACK_HOURS: i64 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("token revoked")]
    Revoked,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("auth configuration error: {0}")]
    Config(String),
}

/// JWT claims: the registered subset we use plus one namespaced map.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_algo: String,
    pub jwt_secret: String,
    pub jwt_public_key_file: String,
    pub jwt_private_key_file: String,
    pub token_expiration_secs: u64,
}

impl From<&AppConfig> for AuthConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            jwt_algo: config.jwt_algo.clone(),
            jwt_secret: config.jwt_secret.clone(),
            jwt_public_key_file: config.jwt_public_key_file.clone(),
            jwt_private_key_file: config.jwt_private_key_file.clone(),
            token_expiration_secs: config.token_expiration_secs,
        }
    }
}

/// Token mint / validate / revoke. One signing scheme is active at a time,
/// chosen at boot; validation pins that scheme, so a token signed any other
/// way is rejected outright.
pub struct AuthService {
    algo: Algorithm,
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
    lifetime: TimeDelta,
    revocations: Arc<RevocationSet>,
    limiter: RateLimiter,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let lifetime = TimeDelta::seconds(config.token_expiration_secs as i64);

        let (algo, encoding, decoding) = match config.jwt_algo.as_str() {
            "HS256" => {
                let secret = config.jwt_secret.as_bytes();
                (
                    Algorithm::HS256,
                    Some(EncodingKey::from_secret(secret)),
                    DecodingKey::from_secret(secret),
                )
            }
            "RS256" => {
                if config.jwt_public_key_file.is_empty() {
                    return Err(AuthError::Config(
                        "RS256 requires a public key file".into(),
                    ));
                }
                let pub_pem = std::fs::read(&config.jwt_public_key_file).map_err(|e| {
                    AuthError::Config(format!("failed to read public key file: {e}"))
                })?;
                let decoding = DecodingKey::from_rsa_pem(&pub_pem)
                    .map_err(|e| AuthError::Config(format!("failed to parse public key: {e}")))?;
                info!("Loaded RSA public key");

                let encoding = if config.jwt_private_key_file.is_empty() {
                    None
                } else {
                    let priv_pem = std::fs::read(&config.jwt_private_key_file).map_err(|e| {
                        AuthError::Config(format!("failed to read private key file: {e}"))
                    })?;
                    Some(EncodingKey::from_rsa_pem(&priv_pem).map_err(|e| {
                        AuthError::Config(format!("failed to parse private key: {e}"))
                    })?)
                };

                (Algorithm::RS256, encoding, decoding)
            }
            other => {
                return Err(AuthError::Config(format!("unsupported algorithm: {other}")));
            }
        };

        Ok(Self {
            algo,
            encoding,
            decoding,
            lifetime,
            revocations: Arc::new(RevocationSet::new()),
            limiter: RateLimiter::default(),
        })
    }

    /// Replace the admission limiter (test sizing).
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// The revocation set, for wiring up the background sweeper.
    pub fn revocations(&self) -> Arc<RevocationSet> {
        Arc::clone(&self.revocations)
    }

    /// Mint a token for `subject` carrying the given custom claims.
    pub fn generate_token(
        &self,
        subject: &str,
        custom: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            custom,
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let key = self.encoding.as_ref().ok_or_else(|| {
            AuthError::Config("signing requires a private key for the active algorithm".into())
        })?;
        encode(&Header::new(self.algo), claims, key).map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Validate a token and return `(subject, custom claims)`.
    ///
    /// Order matters: rate-limit admission, revocation lookup, signature
    /// verification against the pinned algorithm, expiry, then subject.
    pub fn validate_token(
        &self,
        token: &str,
    ) -> Result<(String, serde_json::Map<String, serde_json::Value>), AuthError> {
        if !self.limiter.allow() {
            return Err(AuthError::RateLimited);
        }

        if self.revocations.is_revoked(token) {
            return Err(AuthError::Revoked);
        }

        let mut validation = Validation::new(self.algo);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            }
        })?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::Invalid);
        }

        Ok((data.claims.sub, data.claims.custom))
    }

    /// Put a token on the revocation set. The eviction deadline comes from
    /// the token's own `exp`; unparseable tokens get a fixed fallback.
    pub fn revoke_token(&self, token: &str) {
        let evict_at = self
            .read_expiry_unverified(token)
            .unwrap_or_else(|| Utc::now() + TimeDelta::hours(REVOKE_FALLBACK_HOURS));
        self.revocations.revoke(token, evict_at);
    }

    fn read_expiry_unverified(&self, token: &str) -> Option<DateTime<Utc>> {
        let mut validation = Validation::new(self.algo);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
        DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
    }

    /// Liveness of the auth core itself.
    pub fn health_check(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
