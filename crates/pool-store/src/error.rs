//! Pool store errors

use pool_core::PoolError;
use thiserror::Error;

/// Errors that can occur when reading or writing pool records
#[derive(Debug, Error)]
pub enum StoreError {
    /// No pool with this name
    #[error("Pool '{0}' not found")]
    PoolNotFound(String),

    /// A pool with this name already exists
    #[error("Pool '{0}' already exists")]
    AlreadyExists(String),

    /// A concurrent commit took the same block or value
    #[error("Commit conflict: {0}")]
    Conflict(String),

    /// Engine error (release target not found, invalid key, ...)
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl StoreError {
    /// Whether retrying the operation from a fresh snapshot may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
