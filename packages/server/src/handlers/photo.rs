use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use common::events::{PhotoDeleted, PhotoUploaded, SUBJECT_PHOTO_DELETED, SUBJECT_PHOTO_UPLOADED};
use events::EventPublisher;

use crate::error::{AppError, ErrorBody};
use crate::models::photo::{PhotoListResponse, PhotoQuery, UploadResponse};
use crate::state::AppState;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Multipart uploads are parsed with a 32 MiB in-memory threshold.
pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(32 * 1024 * 1024)
}

/// Fire-and-forget event emission. The publish deadline lives in the bus, so
/// the spawned task cannot outlive it by much; failures are logged and
/// swallowed because the dual write has already succeeded.
pub(crate) fn spawn_publish<T: Serialize + Send + 'static>(
    publisher: Option<Arc<dyn EventPublisher>>,
    subject: &'static str,
    event: T,
) {
    let Some(publisher) = publisher else {
        debug!(subject, "Event bus unavailable, not publishing");
        return;
    };

    tokio::spawn(async move {
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                if let Err(e) = publisher.publish(subject, payload).await {
                    warn!(subject, error = %e, "Failed to publish event");
                }
            }
            Err(e) => warn!(subject, error = %e, "Failed to encode event"),
        }
    });
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Photos",
    operation_id = "uploadPhoto",
    summary = "Upload a photo",
    request_body(content_type = "multipart/form-data", description = "The `file` field carries the photo"),
    responses(
        (status = 201, description = "Photo stored", body = UploadResponse),
        (status = 400, description = "Malformed multipart body (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadInput(format!("Failed to parse form: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let mime = field
                .content_type()
                .unwrap_or(DEFAULT_MIME)
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadInput(format!("Failed to read file field: {e}")))?;
            file = Some((filename, mime, data));
        }
    }

    let (filename, mime, data) =
        file.ok_or_else(|| AppError::BadInput("Failed to get file from form".into()))?;

    let id = Uuid::new_v4();
    let s3_key = format!("photos/{id}");

    state.storage.put(&s3_key, data, &mime).await?;

    let new_photo = common::photos::NewPhoto {
        id,
        s3_key: s3_key.clone(),
        filename: filename.clone(),
        mime: mime.clone(),
    };
    if let Err(e) = state.photos.save_photo(&new_photo).await {
        // The blob is now orphaned; there is no reaper, only this trace.
        error!(photo_id = %id, s3_key = %s3_key, error = %e, "Metadata insert failed after blob write");
        return Err(e.into());
    }

    spawn_publish(
        state.publisher.clone(),
        SUBJECT_PHOTO_UPLOADED,
        PhotoUploaded::new(id, &filename, &mime, &s3_key),
    );

    Ok((StatusCode::CREATED, Json(UploadResponse { id })))
}

#[utoipa::path(
    get,
    path = "/photo/{id}",
    tag = "Photos",
    operation_id = "getPhoto",
    summary = "Stream a photo or one of its thumbnails",
    params(
        ("id" = Uuid, Path, description = "Photo ID"),
        PhotoQuery,
    ),
    responses(
        (status = 200, description = "Blob stream"),
        (status = 401, description = "Unauthorized (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Photo not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, query), fields(photo_id = %id))]
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PhotoQuery>,
) -> Result<impl IntoResponse, AppError> {
    let photo = state.photos.get_photo(id).await?;

    // Serve the requested thumbnail when it exists; fall back to the
    // original otherwise. Thumbnails are always JPEG.
    let (s3_key, mime) = match query.thumbnail.as_deref() {
        Some(size) => match photo.thumbnail_key(size) {
            Some(key) => (key.to_string(), "image/jpeg".to_string()),
            None => {
                debug!(size, "Thumbnail not recorded, serving original");
                (photo.s3_key.clone(), photo.mime.clone())
            }
        },
        None => (photo.s3_key.clone(), photo.mime.clone()),
    };

    let (reader, _) = state.storage.get(&s3_key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let mime = if mime.is_empty() {
        DEFAULT_MIME.to_string()
    } else {
        mime
    };

    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (
                header::CACHE_CONTROL,
                "public, max-age=86400".to_string(),
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    delete,
    path = "/photo/{id}",
    tag = "Photos",
    operation_id = "deletePhoto",
    summary = "Hard-delete a photo, bypassing the trash",
    params(("id" = Uuid, Path, description = "Photo ID")),
    responses(
        (status = 204, description = "Photo deleted"),
        (status = 401, description = "Unauthorized (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Photo not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state), fields(photo_id = %id))]
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let photo = state.photos.get_photo(id).await?;

    state.storage.delete(&photo.s3_key).await?;
    state.photos.delete_photo(id).await?;

    spawn_publish(
        state.publisher.clone(),
        SUBJECT_PHOTO_DELETED,
        PhotoDeleted::new(id),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/photos",
    tag = "Photos",
    operation_id = "listPhotos",
    summary = "List active photos, newest first",
    responses(
        (status = 200, description = "Active photos", body = PhotoListResponse),
        (status = 401, description = "Unauthorized (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state))]
pub async fn list_photos(
    State(state): State<AppState>,
) -> Result<Json<PhotoListResponse>, AppError> {
    let photos = state.photos.list_active().await?;
    Ok(Json(PhotoListResponse { photos }))
}
