use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sea_orm::{ConnectOptions, Database};
use tracing::info;

use common::photos::{ensure_schema, PgPhotoStore, PhotoStore};
use common::storage::{ObjectStore, S3ObjectStore};
use events::init_events;

use worker::config::WorkerConfig;
use worker::consumer;
use worker::thumbnail::ThumbnailContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = WorkerConfig::load().context("Failed to load config")?;
    let sizes = config.sizes();
    info!(workers = config.thumb_workers, ?sizes, "Thumbnail worker starting");

    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(10)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(30 * 60))
        .max_lifetime(Duration::from_secs(60 * 60))
        .sqlx_logging(false);
    let db = Database::connect(opt)
        .await
        .context("Failed to connect to database")?;
    ensure_schema(&db)
        .await
        .context("Failed to initialize photos schema")?;

    let photos: Arc<dyn PhotoStore> = Arc::new(
        PgPhotoStore::probe(db)
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

    // Unlike the server, the worker is nothing without the broker.
    let bus = init_events(config.events_config())
        .await
        .context("Failed to connect to event bus")?;

    let ctx = Arc::new(ThumbnailContext {
        storage,
        photos,
        sizes,
    });

    tokio::select! {
        result = consumer::run(ctx, &bus, config.thumb_workers) => {
            result.context("Consumer stopped unexpectedly")?;
        }
        _ = shutdown_signal() => {
            info!("Shutting down");
        }
    }

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
