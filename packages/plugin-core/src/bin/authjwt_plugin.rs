//! JWT-validating plugin: the out-of-process counterpart of the host's
//! built-in auth core. It implements only `ValidateToken`, checking HS256
//! signatures against the shared `JWT_SECRET`, so a host running with plugin
//! admission can keep accepting the same tokens.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use plugin_core::proto::photo_plugin_server::{PhotoPlugin, PhotoPluginServer};
use plugin_core::proto::{
    Photo, SearchRequest, SearchResult, ValidateTokenRequest, ValidateTokenResponse,
};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
}

struct AuthJwtPlugin {
    decoding: DecodingKey,
}

impl AuthJwtPlugin {
    fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").unwrap_or_else(|_| "supersecret123".to_string());
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[tonic::async_trait]
impl PhotoPlugin for AuthJwtPlugin {
    async fn process_photo(&self, _request: Request<Photo>) -> Result<Response<()>, Status> {
        Err(Status::unimplemented("authjwt plugin does not process photos"))
    }

    async fn search(
        &self,
        _request: Request<SearchRequest>,
    ) -> Result<Response<SearchResult>, Status> {
        Err(Status::unimplemented("authjwt plugin does not search"))
    }

    async fn validate_token(
        &self,
        request: Request<ValidateTokenRequest>,
    ) -> Result<Response<ValidateTokenResponse>, Status> {
        let token = request.into_inner().token;
        if token.is_empty() {
            return Ok(Response::new(ValidateTokenResponse {
                ok: false,
                user_id: String::new(),
                error: "empty token".into(),
            }));
        }

        let validation = Validation::new(Algorithm::HS256);
        let response = match decode::<Claims>(&token, &self.decoding, &validation) {
            Ok(data) => ValidateTokenResponse {
                ok: true,
                user_id: data.claims.sub,
                error: String::new(),
            },
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                ValidateTokenResponse {
                    ok: false,
                    user_id: String::new(),
                    error: e.to_string(),
                }
            }
        };

        Ok(Response::new(response))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    // The supervisor scans stdout for exactly this line.
    println!("PORT={port}");

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_service_status("", tonic_health::ServingStatus::Serving)
        .await;

    info!(port, "authjwt plugin serving");

    Server::builder()
        .add_service(health_service)
        .add_service(PhotoPluginServer::new(AuthJwtPlugin::from_env()))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
    info!("authjwt plugin shutting down");
}
