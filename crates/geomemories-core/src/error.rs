//! Error type surfaced by the storage service.

use thiserror::Error;

/// Failure of a storage service operation.
///
/// Backend errors never leave the service unwrapped: they arrive as
/// [`StorageError::PersistenceFailure`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// User-correctable input problem. Nothing was written.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The addressed record (or a record it references) does not exist.
    #[error("Entity not found")]
    NotFound,

    /// The underlying store failed (constraint violation, I/O, decode).
    #[error("Persistence failure: {0:#}")]
    PersistenceFailure(anyhow::Error),
}

impl StorageError {
    pub fn invalid(message: impl Into<String>) -> Self {
        StorageError::InvalidInput(message.into())
    }
}

impl From<anyhow::Error> for StorageError {
    fn from(e: anyhow::Error) -> Self {
        StorageError::PersistenceFailure(e)
    }
}
