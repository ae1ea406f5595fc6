mod error;

pub mod memory;
pub mod postgres;

pub use error::StoreError;
pub use memory::MemoryPhotoStore;
pub use postgres::{ensure_schema, PgPhotoStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a photo row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Active,
    Trashed,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trashed => "trashed",
        }
    }
}

/// A photo row as stored in the metadata database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub s3_key: String,
    pub filename: String,
    pub mime: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub status: PhotoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl Photo {
    /// Blob key of the thumbnail for `size`, if one has been recorded.
    pub fn thumbnail_key(&self, size: &str) -> Option<&str> {
        self.meta
            .as_ref()?
            .get("thumbnails")?
            .get(size)?
            .as_str()
    }

    /// Every thumbnail blob key recorded in the metadata map.
    pub fn thumbnail_keys(&self) -> Vec<String> {
        let Some(thumbnails) = self.meta.as_ref().and_then(|m| m.get("thumbnails")) else {
            return Vec::new();
        };
        let Some(map) = thumbnails.as_object() else {
            return Vec::new();
        };
        map.values()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()
    }
}

/// Fields the upload path chooses for a new row; everything else is defaulted
/// by the store (`created_at`, `status = active`).
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub id: Uuid,
    pub s3_key: String,
    pub filename: String,
    pub mime: String,
}

/// Which optional columns the `photos` table actually has. Probed once at
/// startup; reads degrade to defaults for whatever is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnPresence {
    pub deleted_at: bool,
    pub status: bool,
}

impl ColumnPresence {
    pub fn all() -> Self {
        Self {
            deleted_at: true,
            status: true,
        }
    }
}

/// A photo row as it comes off the wire, before tolerant normalisation.
#[derive(Debug, Clone, Default)]
pub struct RawPhotoRow {
    pub id: Uuid,
    pub s3_key: String,
    pub filename: Option<String>,
    pub mime: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub meta: Option<serde_json::Value>,
}

/// Normalise a raw row into a `Photo`, substituting defaults for columns the
/// deployed schema does not have. Pure so older-schema behaviour is testable
/// without a database.
pub fn fold_row(presence: &ColumnPresence, raw: RawPhotoRow) -> Photo {
    let status = if presence.status {
        match raw.status.as_deref() {
            Some("trashed") => PhotoStatus::Trashed,
            _ => PhotoStatus::Active,
        }
    } else {
        PhotoStatus::Active
    };

    Photo {
        id: raw.id,
        s3_key: raw.s3_key,
        filename: raw.filename.unwrap_or_default(),
        mime: raw.mime.unwrap_or_default(),
        created_at: raw.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        deleted_at: if presence.deleted_at {
            raw.deleted_at
        } else {
            None
        },
        status,
        meta: raw.meta,
    }
}

/// Typed access to the photos table. Every write maps to a single SQL
/// statement in the Postgres implementation.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Insert a freshly uploaded photo row.
    async fn save_photo(&self, photo: &NewPhoto) -> Result<(), StoreError>;

    /// Fetch a row by id, whatever its status.
    async fn get_photo(&self, id: Uuid) -> Result<Photo, StoreError>;

    /// Hard-delete a row regardless of status (legacy delete path).
    async fn delete_photo(&self, id: Uuid) -> Result<(), StoreError>;

    /// Active photos, newest first.
    async fn list_active(&self) -> Result<Vec<Photo>, StoreError>;

    /// Trashed photos, most recently trashed first.
    async fn list_trashed(&self) -> Result<Vec<Photo>, StoreError>;

    /// `active -> trashed`. `Conflict` if the row exists but is not active.
    async fn trash_photo(&self, id: Uuid) -> Result<(), StoreError>;

    /// `trashed -> active`. `Conflict` if the row exists but is not trashed.
    async fn restore_photo(&self, id: Uuid) -> Result<(), StoreError>;

    /// Bulk-delete every trashed row; returns how many were removed.
    async fn empty_trash(&self) -> Result<u64, StoreError>;

    /// Delete a single trashed row. `Conflict` if the row is not trashed.
    async fn permanently_delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Atomically record `meta.thumbnails[size] = key`.
    async fn merge_thumbnail(&self, id: Uuid, size: &str, key: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: Uuid) -> RawPhotoRow {
        RawPhotoRow {
            id,
            s3_key: format!("photos/{id}"),
            filename: Some("cat.png".into()),
            mime: Some("image/png".into()),
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn fold_defaults_status_when_column_missing() {
        let id = Uuid::new_v4();
        let mut row = raw(id);
        row.status = Some("trashed".into());
        row.deleted_at = Some(Utc::now());

        // With the columns absent the row reads as active, untrashed.
        let photo = fold_row(&ColumnPresence::default(), row);
        assert_eq!(photo.status, PhotoStatus::Active);
        assert!(photo.deleted_at.is_none());
    }

    #[test]
    fn fold_honours_present_columns() {
        let id = Uuid::new_v4();
        let mut row = raw(id);
        row.status = Some("trashed".into());
        row.deleted_at = Some(Utc::now());

        let photo = fold_row(&ColumnPresence::all(), row);
        assert_eq!(photo.status, PhotoStatus::Trashed);
        assert!(photo.deleted_at.is_some());
    }

    #[test]
    fn fold_null_status_reads_as_active() {
        let id = Uuid::new_v4();
        let photo = fold_row(&ColumnPresence::all(), raw(id));
        assert_eq!(photo.status, PhotoStatus::Active);
    }

    #[test]
    fn thumbnail_lookup() {
        let id = Uuid::new_v4();
        let mut row = raw(id);
        row.meta = Some(json!({
            "thumbnails": { "512": format!("thumb/512/{id}.jpg"), "256": "thumb/256/x.jpg" }
        }));
        let photo = fold_row(&ColumnPresence::all(), row);

        assert_eq!(
            photo.thumbnail_key("512"),
            Some(format!("thumb/512/{id}.jpg").as_str())
        );
        assert_eq!(photo.thumbnail_key("1024"), None);

        let mut keys = photo.thumbnail_keys();
        keys.sort();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn thumbnail_lookup_without_meta() {
        let id = Uuid::new_v4();
        let photo = fold_row(&ColumnPresence::all(), raw(id));
        assert_eq!(photo.thumbnail_key("512"), None);
        assert!(photo.thumbnail_keys().is_empty());
    }

    #[test]
    fn photo_serialises_with_wire_field_names() {
        let id = Uuid::new_v4();
        let photo = fold_row(&ColumnPresence::all(), raw(id));
        let value = serde_json::to_value(&photo).unwrap();

        assert!(value.get("s3_key").is_some());
        assert!(value.get("created_at").is_some());
        assert_eq!(value.get("status").unwrap(), "active");
        // Absent optionals are omitted, matching the legacy wire format.
        assert!(value.get("deleted_at").is_none());
    }
}
