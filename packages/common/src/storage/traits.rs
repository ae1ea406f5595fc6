use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Opaque blob storage keyed by string. `put` overwrites, `get` fails with
/// `NotFound` for absent keys, `delete` is idempotent.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the backing bucket if it does not exist yet.
    async fn ensure_bucket(&self) -> Result<(), StorageError>;

    /// Store a blob under `key` with the given content type.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Retrieve a blob as a streaming reader plus its stored content type.
    async fn get(&self, key: &str) -> Result<(BoxReader, Option<String>), StorageError>;

    /// Remove a blob. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Retrieve a whole blob into memory.
    async fn get_bytes(&self, key: &str) -> Result<Bytes, StorageError> {
        let (mut reader, _) = self.get(key).await?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(Bytes::from(buf))
    }
}
