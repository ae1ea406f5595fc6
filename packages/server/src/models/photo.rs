use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use common::photos::Photo;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PhotoListResponse {
    #[schema(value_type = Vec<Object>)]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrashActionResponse {
    pub message: String,
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmptyTrashResponse {
    pub message: String,
    pub count: u64,
}

/// Query parameters of the photo read path.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PhotoQuery {
    /// Size token of a thumbnail to serve instead of the original.
    pub thumbnail: Option<String>,
    /// Bearer token channel for image tags that cannot set headers.
    pub token: Option<String>,
}
