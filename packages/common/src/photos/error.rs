use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the photo metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("photo not found: {0}")]
    NotFound(Uuid),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("failed to decode photo row: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
