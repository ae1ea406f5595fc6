use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::error::StorageError;
use super::traits::{BoxReader, ObjectStore};

/// In-memory blob store used by tests and by degraded local deployments.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a key currently exists.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<(BoxReader, Option<String>), StorageError> {
        let guard = self.objects.lock().unwrap();
        let (data, content_type) = guard
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        Ok((reader, Some(content_type.clone())))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = MemoryObjectStore::new();
        store
            .put("photos/a", Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();

        let data = store.get_bytes("photos/a").await.unwrap();
        assert_eq!(&data[..], b"hello");

        let (_, content_type) = store.get("photos/a").await.unwrap();
        assert_eq!(content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryObjectStore::new();
        let err = store.get("nope").await.err().unwrap();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn put_overwrites() {
        let store = MemoryObjectStore::new();
        store
            .put("k", Bytes::from_static(b"one"), "text/plain")
            .await
            .unwrap();
        store
            .put("k", Bytes::from_static(b"two"), "text/plain")
            .await
            .unwrap();
        assert_eq!(&store.get_bytes("k").await.unwrap()[..], b"two");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryObjectStore::new();
        store
            .put("k", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.contains("k"));
    }
}
