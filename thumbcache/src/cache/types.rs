//! Error type shared by both cache tiers.

use thiserror::Error;

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// Thumbnail could not be encoded for storage
    #[error("Failed to encode thumbnail artifact: {0}")]
    Encode(String),

    /// Blocking filesystem task panicked or was cancelled
    #[error("Cache background task failed: {0}")]
    Spawn(String),
}
