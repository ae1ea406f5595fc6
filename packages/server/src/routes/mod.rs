use std::time::Duration;

use axum::middleware;
use tower_http::timeout::TimeoutLayer;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::auth::{require_admin, require_auth};
use crate::handlers;
use crate::state::AppState;

/// Orchestration deadline for ordinary requests.
const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

/// Empty-trash walks every blob of every trashed photo; give it more room.
const BULK_TRASH_DEADLINE: Duration = Duration::from_secs(60);

pub fn api_routes(state: AppState) -> OpenApiRouter<AppState> {
    let auth = OpenApiRouter::new()
        .routes(routes!(handlers::health::auth_health))
        .routes(routes!(handlers::auth::generate_token))
        .routes(routes!(handlers::auth::revoke_token))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::recreate_admin))
        .layer(TimeoutLayer::new(REQUEST_DEADLINE));

    let users = OpenApiRouter::new()
        .routes(routes!(
            handlers::user::list_users,
            handlers::user::create_user,
        ))
        .routes(routes!(
            handlers::user::get_user,
            handlers::user::update_user,
            handlers::user::delete_user,
        ))
        .layer(middleware::from_fn(require_admin));

    let plugins = OpenApiRouter::new()
        .routes(routes!(handlers::plugin::list_plugins))
        .layer(middleware::from_fn(require_admin));

    let trash_bulk = OpenApiRouter::new()
        .routes(routes!(
            handlers::trash::list_trash,
            handlers::trash::empty_trash,
        ))
        .layer(TimeoutLayer::new(BULK_TRASH_DEADLINE));

    let photos = OpenApiRouter::new()
        .routes(routes!(handlers::photo::upload_photo))
        .routes(routes!(
            handlers::photo::get_photo,
            handlers::photo::delete_photo,
        ))
        .routes(routes!(handlers::photo::list_photos))
        .routes(routes!(
            handlers::trash::trash_photo,
            handlers::trash::purge_photo,
        ))
        .routes(routes!(handlers::trash::restore_photo))
        .layer(handlers::photo::upload_body_limit())
        .layer(TimeoutLayer::new(REQUEST_DEADLINE));

    let protected = OpenApiRouter::new()
        .merge(photos)
        .merge(trash_bulk)
        .nest("/users", users)
        .nest("/plugins", plugins)
        .layer(middleware::from_fn_with_state(state, require_auth));

    OpenApiRouter::new().nest("/auth", auth).merge(protected)
}
