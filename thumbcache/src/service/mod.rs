//! High-level thumbnail service.
//!
//! Wires the memory and disk caches, the request coalescer, the priority
//! scheduler, the worker pool and the maintenance daemon behind one object.
//! There is no global instance; construct one per library view (or per test).
//!
//! ```ignore
//! use std::sync::Arc;
//! use thumbcache::pipeline::Priority;
//! use thumbcache::renderer::ImageRenderer;
//! use thumbcache::service::{ThumbnailService, ThumbnailServiceConfig};
//!
//! let config = ThumbnailServiceConfig::new("/tmp/thumbs").with_workers(4);
//! let service = ThumbnailService::start(config, Arc::new(ImageRenderer::default())).await?;
//!
//! let mut ready = service.subscribe();
//! let ticket = service.request("/photos/a.jpg", Priority::Background);
//! ```

mod config;
mod error;
mod facade;

pub use config::ThumbnailServiceConfig;
pub use error::ServiceError;
pub use facade::{ThumbnailService, DEFAULT_SHUTDOWN_GRACE};
