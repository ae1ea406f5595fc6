use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::error::StoreError;
use super::{NewPhoto, Photo, PhotoStatus, PhotoStore};

/// In-memory photo store with the same state-machine semantics as the
/// Postgres implementation. Backs the HTTP integration tests.
#[derive(Debug, Default)]
pub struct MemoryPhotoStore {
    photos: RwLock<HashMap<Uuid, Photo>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.photos.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn save_photo(&self, photo: &NewPhoto) -> Result<(), StoreError> {
        let mut guard = self.photos.write().unwrap();
        guard.insert(
            photo.id,
            Photo {
                id: photo.id,
                s3_key: photo.s3_key.clone(),
                filename: photo.filename.clone(),
                mime: photo.mime.clone(),
                created_at: Utc::now(),
                deleted_at: None,
                status: PhotoStatus::Active,
                meta: None,
            },
        );
        Ok(())
    }

    async fn get_photo(&self, id: Uuid) -> Result<Photo, StoreError> {
        self.photos
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn delete_photo(&self, id: Uuid) -> Result<(), StoreError> {
        self.photos
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_active(&self) -> Result<Vec<Photo>, StoreError> {
        let guard = self.photos.read().unwrap();
        let mut photos: Vec<Photo> = guard
            .values()
            .filter(|p| p.status == PhotoStatus::Active)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(photos)
    }

    async fn list_trashed(&self) -> Result<Vec<Photo>, StoreError> {
        let guard = self.photos.read().unwrap();
        let mut photos: Vec<Photo> = guard
            .values()
            .filter(|p| p.status == PhotoStatus::Trashed)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(photos)
    }

    async fn trash_photo(&self, id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.photos.write().unwrap();
        let photo = guard.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if photo.status != PhotoStatus::Active {
            return Err(StoreError::conflict(format!("photo already trashed: {id}")));
        }
        photo.status = PhotoStatus::Trashed;
        photo.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn restore_photo(&self, id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.photos.write().unwrap();
        let photo = guard.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if photo.status != PhotoStatus::Trashed {
            return Err(StoreError::conflict(format!("photo not in trash: {id}")));
        }
        photo.status = PhotoStatus::Active;
        photo.deleted_at = None;
        Ok(())
    }

    async fn empty_trash(&self) -> Result<u64, StoreError> {
        let mut guard = self.photos.write().unwrap();
        let before = guard.len();
        guard.retain(|_, p| p.status != PhotoStatus::Trashed);
        Ok((before - guard.len()) as u64)
    }

    async fn permanently_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.photos.write().unwrap();
        match guard.get(&id) {
            None => Err(StoreError::NotFound(id)),
            Some(p) if p.status != PhotoStatus::Trashed => {
                Err(StoreError::conflict(format!("photo not in trash: {id}")))
            }
            Some(_) => {
                guard.remove(&id);
                Ok(())
            }
        }
    }

    async fn merge_thumbnail(&self, id: Uuid, size: &str, key: &str) -> Result<(), StoreError> {
        let mut guard = self.photos.write().unwrap();
        let photo = guard.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let meta = photo.meta.get_or_insert_with(|| json!({}));
        let obj = meta
            .as_object_mut()
            .ok_or_else(|| StoreError::Decode("meta is not an object".into()))?;
        let thumbnails = obj
            .entry("thumbnails")
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or_else(|| StoreError::Decode("meta.thumbnails is not an object".into()))?;
        thumbnails.insert(size.to_string(), json!(key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_photo() -> NewPhoto {
        let id = Uuid::new_v4();
        NewPhoto {
            id,
            s3_key: format!("photos/{id}"),
            filename: "cat.png".into(),
            mime: "image/png".into(),
        }
    }

    #[tokio::test]
    async fn trash_restore_state_machine() {
        let store = MemoryPhotoStore::new();
        let photo = new_photo();
        store.save_photo(&photo).await.unwrap();

        store.trash_photo(photo.id).await.unwrap();
        assert!(matches!(
            store.trash_photo(photo.id).await,
            Err(StoreError::Conflict(_))
        ));

        store.restore_photo(photo.id).await.unwrap();
        assert!(matches!(
            store.restore_photo(photo.id).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn trash_of_missing_row_is_not_found() {
        let store = MemoryPhotoStore::new();
        assert!(matches!(
            store.trash_photo(Uuid::new_v4()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listings_split_by_status() {
        let store = MemoryPhotoStore::new();
        let a = new_photo();
        let b = new_photo();
        store.save_photo(&a).await.unwrap();
        store.save_photo(&b).await.unwrap();
        store.trash_photo(a.id).await.unwrap();

        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);

        let trashed = store.list_trashed().await.unwrap();
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].id, a.id);
        assert!(trashed[0].deleted_at.is_some());
    }

    #[tokio::test]
    async fn empty_trash_counts_only_trashed_rows() {
        let store = MemoryPhotoStore::new();
        let a = new_photo();
        let b = new_photo();
        store.save_photo(&a).await.unwrap();
        store.save_photo(&b).await.unwrap();
        store.trash_photo(a.id).await.unwrap();

        assert_eq!(store.empty_trash().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.get_photo(a.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn permanent_delete_requires_trashed() {
        let store = MemoryPhotoStore::new();
        let photo = new_photo();
        store.save_photo(&photo).await.unwrap();

        assert!(matches!(
            store.permanently_delete(photo.id).await,
            Err(StoreError::Conflict(_))
        ));

        store.trash_photo(photo.id).await.unwrap();
        store.permanently_delete(photo.id).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn merge_thumbnail_is_upsert_per_size() {
        let store = MemoryPhotoStore::new();
        let photo = new_photo();
        store.save_photo(&photo).await.unwrap();

        store
            .merge_thumbnail(photo.id, "512", "thumb/512/a.jpg")
            .await
            .unwrap();
        // Re-merging the same size replaces, it does not duplicate.
        store
            .merge_thumbnail(photo.id, "512", "thumb/512/b.jpg")
            .await
            .unwrap();
        store
            .merge_thumbnail(photo.id, "256", "thumb/256/a.jpg")
            .await
            .unwrap();

        let stored = store.get_photo(photo.id).await.unwrap();
        assert_eq!(stored.thumbnail_key("512"), Some("thumb/512/b.jpg"));
        assert_eq!(stored.thumbnail_keys().len(), 2);
    }
}
