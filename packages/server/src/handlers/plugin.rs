use axum::extract::State;
use axum::Json;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::models::plugin::PluginListResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Plugins",
    operation_id = "listPlugins",
    summary = "List loaded plugins and their advertised capabilities",
    responses(
        (status = 200, description = "Loaded plugins", body = PluginListResponse),
        (status = 403, description = "Not an admin (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn list_plugins(
    State(state): State<AppState>,
) -> Result<Json<PluginListResponse>, AppError> {
    Ok(Json(PluginListResponse {
        plugins: state.plugins.registry().infos(),
    }))
}
