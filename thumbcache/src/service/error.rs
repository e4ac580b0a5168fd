use thiserror::Error;

use crate::cache::CacheError;

/// Errors from constructing or managing a thumbnail service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration rejected by validation
    #[error("Invalid service configuration: {0}")]
    Config(String),

    /// Cache setup or maintenance failure
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The service was already shut down
    #[error("Thumbnail service already shut down")]
    AlreadyShutDown,
}
