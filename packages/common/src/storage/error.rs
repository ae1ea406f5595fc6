use std::fmt;

/// Errors surfaced by blob storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The requested key does not exist.
    NotFound(String),
    /// The backend could not be reached (connect, timeout, broken transport).
    Transport(String),
    /// The backend rejected our credentials or signature.
    Auth(String),
    /// Anything else the backend reported.
    Other(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "object not found: {key}"),
            Self::Transport(msg) => write!(f, "storage transport error: {msg}"),
            Self::Auth(msg) => write!(f, "storage auth error: {msg}"),
            Self::Other(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    /// Whether retrying the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
