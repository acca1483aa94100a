//! Storage error types
//!
//! Errors raised by the local key-value store and the remote document store.

use thiserror::Error;

/// Errors that can occur in either storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local database failure
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Remote store could not be reached
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// Remote store answered with a non-success status
    #[error("Remote store error {status}: {message}")]
    Remote { status: u16, message: String },

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl StorageError {
    /// Whether the failure is a transient source failure (try the next source)
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Io(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            StorageError::Unavailable(err.to_string())
        } else if let Some(status) = err.status() {
            StorageError::Remote {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            StorageError::Unavailable(err.to_string())
        }
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
