use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subject a successful upload is announced on.
pub const SUBJECT_PHOTO_UPLOADED: &str = "photo.uploaded";

/// Subject a hard delete is announced on.
pub const SUBJECT_PHOTO_DELETED: &str = "photo.deleted";

/// Wire payload for `photo.uploaded`. Field names and the RFC 3339 timestamp
/// format are part of the published contract; consumers outside this
/// repository depend on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoUploaded {
    pub id: String,
    pub filename: String,
    pub mime: String,
    pub s3_key: String,
    pub created_at: String,
}

impl PhotoUploaded {
    pub fn new(id: Uuid, filename: &str, mime: &str, s3_key: &str) -> Self {
        Self {
            id: id.to_string(),
            filename: filename.to_string(),
            mime: mime.to_string(),
            s3_key: s3_key.to_string(),
            created_at: rfc3339_now(),
        }
    }
}

/// Wire payload for `photo.deleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoDeleted {
    pub id: String,
    pub deleted_at: String,
}

impl PhotoDeleted {
    pub fn new(id: Uuid) -> Self {
        Self {
            id: id.to_string(),
            deleted_at: rfc3339_now(),
        }
    }
}

fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
