use thiserror::Error;

use common::photos::StoreError;
use common::storage::StorageError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("malformed event: {0}")]
    BadEvent(String),

    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("failed to encode thumbnail: {0}")]
    ImageEncode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("background task failed: {0}")]
    Join(String),
}

impl WorkerError {
    /// Terminal failures cannot be fixed by reprocessing the same message:
    /// undecodable payloads or images, and rows/blobs that no longer exist
    /// (the photo was deleted while the message was in flight).
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::BadEvent(_) | Self::ImageDecode(_) | Self::ImageEncode(_) => true,
            Self::Storage(StorageError::NotFound(_)) => true,
            Self::Store(StoreError::NotFound(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn terminal_classification() {
        assert!(WorkerError::BadEvent("x".into()).is_terminal());
        assert!(WorkerError::ImageDecode("x".into()).is_terminal());
        assert!(WorkerError::Storage(StorageError::NotFound("k".into())).is_terminal());
        assert!(WorkerError::Store(StoreError::NotFound(Uuid::new_v4())).is_terminal());

        assert!(!WorkerError::Storage(StorageError::Transport("down".into())).is_terminal());
        assert!(!WorkerError::Store(StoreError::Conflict("c".into())).is_terminal());
        assert!(!WorkerError::Join("panic".into()).is_terminal());
    }
}
