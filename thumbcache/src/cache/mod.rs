//! Two-tier thumbnail cache.
//!
//! A byte-bounded in-memory LRU sits in front of a content-fingerprinted
//! disk store. The memory tier is lost on restart; the disk tier is durable
//! and invalidates itself whenever a source file's modification time changes.

mod daemon;
mod disk;
mod key;
mod memory;
mod recency;
mod stats;
mod types;

pub use daemon::{MaintenanceConfig, MaintenanceDaemon, MaintenanceReport};
pub use disk::{DiskCache, DiskCacheStats, DiskUsage, SweepResult};
pub use key::{DiskCacheKey, ARTIFACT_EXTENSION};
pub use memory::{MemoryCache, MemoryCacheStats, SizeEstimate};
pub use stats::{CacheStatistics, PipelineCounters};
pub use types::CacheError;

use crate::renderer::Thumbnail;
use std::path::PathBuf;

/// Memory tier keyed by absolute source path.
pub type ThumbnailMemoryCache = MemoryCache<PathBuf, Thumbnail>;
