pub mod auth;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod users;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Build the application router: health probe, the `/api` surface, and the
/// static file fallback for the web UI.
pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let (api, _openapi) = routes::api_routes(state.clone()).split_for_parts();

    Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .nest("/api", api)
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}
