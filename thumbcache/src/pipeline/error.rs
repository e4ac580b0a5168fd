//! Pipeline error taxonomy.
//!
//! Workers log these and resolve the request as unavailable; only
//! [`ThumbnailError::Cancelled`] ever reaches a caller.

use std::path::PathBuf;

use thiserror::Error;

use super::gate::GateClosed;
use crate::cache::CacheError;
use crate::renderer::RenderError;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// The source file does not exist
    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The renderer could not produce a thumbnail
    #[error("Failed to render {}: {source}", path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    /// Disk cache read, write, or metadata failure
    #[error("Disk cache I/O failed: {0}")]
    DiskIo(#[from] CacheError),

    /// The waiting caller gave up
    #[error("Thumbnail request cancelled")]
    Cancelled,

    /// The service is shutting down
    #[error("Thumbnail service shut down")]
    ShutDown,

    /// The renderer panicked
    #[error("Renderer panicked while processing {}", .0.display())]
    TaskPanicked(PathBuf),
}

impl From<GateClosed> for ThumbnailError {
    fn from(_: GateClosed) -> Self {
        ThumbnailError::ShutDown
    }
}
