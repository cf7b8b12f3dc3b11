//! Engine error types.

use cachectl_core::ResolveError;
use cachectl_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type CacheControlResult<T> = Result<T, CacheControlError>;

/// Errors raised by the conditional cache.
#[derive(Debug, Error)]
pub enum CacheControlError {
    /// The engine or policy was configured with values it cannot use.
    #[error("invalid cache configuration: {0}")]
    Configuration(String),

    /// The Last-Modified resolver produced no usable time.
    #[error("cannot resolve Last-Modified: {0}")]
    ValidatorResolution(String),

    /// The content producer failed.
    #[error("content producer failed: {0}")]
    Producer(#[source] anyhow::Error),

    /// The producer's reply kept deferring to another resolvable.
    #[error("reply did not resolve to a response within {limit} steps")]
    ResolutionDepthExceeded { limit: usize },

    /// A maintenance call could not reach the store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ResolveError> for CacheControlError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::DepthExceeded { limit } => Self::ResolutionDepthExceeded { limit },
            ResolveError::Failed(source) => Self::Producer(source),
        }
    }
}
