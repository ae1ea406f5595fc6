use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn, Level};

use common::photos::{PgPhotoStore, PhotoStore};
use common::storage::{ObjectStore, S3ObjectStore};
use events::{init_events, EventPublisher};
use plugin_core::PluginSupervisor;

use server::auth::{AuthConfig, AuthService, RevocationSweeper};
use server::config::AppConfig;
use server::state::AppState;
use server::users::{PgUserStore, UserManager};
use server::{build_router, database};

/// Cadence of the revoked-token eviction sweeper.
const REVOCATION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load config")?;

    info!("Initializing implementations");

    let db = database::init_db(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    common::photos::ensure_schema(&db)
        .await
        .context("Failed to initialize photos schema")?;
    database::ensure_users_schema(&db)
        .await
        .context("Failed to initialize users schema")?;

    let photos: Arc<dyn PhotoStore> = Arc::new(
        PgPhotoStore::probe(db.clone())
            .await
            .context("Failed to probe photos schema")?,
    );

    let storage: Arc<dyn ObjectStore> = Arc::new(
        S3ObjectStore::connect(&config.s3_config())
            .await
            .context("Failed to initialize S3 storage")?,
    );
    storage
        .ensure_bucket()
        .await
        .context("Failed to ensure bucket")?;

    // The bus is optional: with the broker down, uploads still work and
    // event emission is skipped with a log line.
    let publisher: Option<Arc<dyn EventPublisher>> =
        match init_events(config.events_config()).await {
            Ok(bus) => Some(Arc::new(bus)),
            Err(e) => {
                warn!(error = %e, "Failed to initialize event bus, continuing without publishing");
                None
            }
        };

    let plugins = Arc::new(PluginSupervisor::new(config.plugin_config()));
    if let Err(e) = plugins.load_all().await {
        warn!(error = %e, "Failed to load plugins");
    }

    let auth = Arc::new(AuthService::new(&AuthConfig::from(&config))?);
    let sweeper = RevocationSweeper::start(auth.revocations(), REVOCATION_SWEEP_INTERVAL);

    let users = Arc::new(UserManager::new(Arc::new(PgUserStore::new(db.clone()))));
    users
        .ensure_seed_admin()
        .await
        .context("Failed to initialize user accounts")?;

    info!("===================================================================");
    info!("User management is enabled!");
    info!("Use the default credentials to log in for the first time");
    info!("Use the admin panel to create additional users and change passwords");
    info!("===================================================================");

    let listen_addr = config.listen_addr.clone();
    let state = AppState {
        config,
        photos,
        storage,
        publisher,
        auth,
        users,
        plugins: Arc::clone(&plugins),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!("Starting Pixie Core server on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down");
    sweeper.stop();
    plugins.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}
