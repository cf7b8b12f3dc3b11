//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when talking to a key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend failed to perform the operation.
    #[error("Store operation failed: {0}")]
    Backend(String),

    /// Failed to serialize or deserialize a value.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend does not offer this capability.
    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}
