//! Minimal reference plugin: answers the handshake, serves gRPC health, and
//! implements `ProcessPhoto` and `Search` as no-ops. `ValidateToken` is left
//! unimplemented so the supervisor's capability probe excludes it.

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::info;

use plugin_core::proto::photo_plugin_server::{PhotoPlugin, PhotoPluginServer};
use plugin_core::proto::{
    Photo, SearchRequest, SearchResult, ValidateTokenRequest, ValidateTokenResponse,
};

#[derive(Default)]
struct NoopPlugin;

#[tonic::async_trait]
impl PhotoPlugin for NoopPlugin {
    async fn process_photo(&self, request: Request<Photo>) -> Result<Response<()>, Status> {
        let photo = request.into_inner();
        if !photo.id.is_empty() {
            info!(photo_id = %photo.id, "Received ProcessPhoto request");
        }
        Ok(Response::new(()))
    }

    async fn search(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<SearchResult>, Status> {
        let req = request.into_inner();
        if !req.query.is_empty() {
            info!(query = %req.query, "Received Search request");
        }
        Ok(Response::new(SearchResult { ids: Vec::new() }))
    }

    async fn validate_token(
        &self,
        _request: Request<ValidateTokenRequest>,
    ) -> Result<Response<ValidateTokenResponse>, Status> {
        Err(Status::unimplemented("noop plugin does not validate tokens"))
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

    info!(port, "noop plugin serving");

    Server::builder()
        .add_service(health_service)
        .add_service(PhotoPluginServer::new(NoopPlugin))
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
    info!("noop plugin shutting down");
}
