use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{instrument, warn};
use uuid::Uuid;

use common::photos::{Photo, PhotoStatus};

use crate::error::{AppError, ErrorBody};
use crate::models::photo::{EmptyTrashResponse, PhotoListResponse, TrashActionResponse};
use crate::state::AppState;

#[utoipa::path(
    put,
    path = "/photos/trash/{id}",
    tag = "Trash",
    operation_id = "trashPhoto",
    summary = "Move a photo to the trash",
    params(("id" = Uuid, Path, description = "Photo ID")),
    responses(
        (status = 200, description = "Photo trashed", body = TrashActionResponse),
        (status = 404, description = "Photo not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Photo already trashed (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(photo_id = %id))]
pub async fn trash_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrashActionResponse>, AppError> {
    state.photos.trash_photo(id).await?;
    Ok(Json(TrashActionResponse {
        message: "Photo moved to trash".into(),
        id,
    }))
}

#[utoipa::path(
    put,
    path = "/photos/trash/{id}/restore",
    tag = "Trash",
    operation_id = "restorePhoto",
    summary = "Restore a photo from the trash",
    params(("id" = Uuid, Path, description = "Photo ID")),
    responses(
        (status = 200, description = "Photo restored", body = TrashActionResponse),
        (status = 404, description = "Photo not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Photo not in trash (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(photo_id = %id))]
pub async fn restore_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrashActionResponse>, AppError> {
    state.photos.restore_photo(id).await?;
    Ok(Json(TrashActionResponse {
        message: "Photo restored from trash".into(),
        id,
    }))
}

#[utoipa::path(
    get,
    path = "/photos/trash",
    tag = "Trash",
    operation_id = "listTrash",
    summary = "List trashed photos, most recently trashed first",
    responses(
        (status = 200, description = "Trashed photos", body = PhotoListResponse),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn list_trash(
    State(state): State<AppState>,
) -> Result<Json<PhotoListResponse>, AppError> {
    let photos = state.photos.list_trashed().await?;
    Ok(Json(PhotoListResponse { photos }))
}

#[utoipa::path(
    delete,
    path = "/photos/trash",
    tag = "Trash",
    operation_id = "emptyTrash",
    summary = "Permanently delete everything in the trash",
    responses(
        (status = 200, description = "Trash emptied", body = EmptyTrashResponse),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn empty_trash(
    State(state): State<AppState>,
) -> Result<Json<EmptyTrashResponse>, AppError> {
    let photos = state.photos.list_trashed().await?;

    // Blob deletion is best-effort per photo; the row purge below is what
    // the returned count reflects.
    for photo in &photos {
        delete_blobs(&state, photo).await;
    }

    let count = state.photos.empty_trash().await?;

    Ok(Json(EmptyTrashResponse {
        message: "Trash emptied".into(),
        count,
    }))
}

#[utoipa::path(
    delete,
    path = "/photos/trash/{id}",
    tag = "Trash",
    operation_id = "purgePhoto",
    summary = "Permanently delete one trashed photo",
    params(("id" = Uuid, Path, description = "Photo ID")),
    responses(
        (status = 204, description = "Photo purged"),
        (status = 404, description = "Photo not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Photo not in trash (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(photo_id = %id))]
pub async fn purge_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let photo = state.photos.get_photo(id).await?;
    if photo.status != PhotoStatus::Trashed {
        return Err(AppError::Conflict(format!("photo not in trash: {id}")));
    }

    state.storage.delete(&photo.s3_key).await?;

    // Thumbnails are reconstructable; a failed delete never blocks the purge.
    for key in photo.thumbnail_keys() {
        if let Err(e) = state.storage.delete(&key).await {
            warn!(photo_id = %id, thumbnail = %key, error = %e, "Failed to delete thumbnail blob");
        }
    }

    state.photos.permanently_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_blobs(state: &AppState, photo: &Photo) {
    if let Err(e) = state.storage.delete(&photo.s3_key).await {
        warn!(photo_id = %photo.id, error = %e, "Failed to delete photo blob");
    }
    for key in photo.thumbnail_keys() {
        if let Err(e) = state.storage.delete(&key).await {
            warn!(photo_id = %photo.id, thumbnail = %key, error = %e, "Failed to delete thumbnail blob");
        }
    }
}
