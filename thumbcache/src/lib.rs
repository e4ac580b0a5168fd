//! Thumbcache - thumbnail caching and generation for large media libraries
//!
//! This library turns source media files into fixed-size raster previews and
//! keeps them in a two-tier cache: a byte-bounded in-memory LRU in front of a
//! fingerprinted on-disk store. Generation is driven by a fixed worker pool
//! that drains a two-lane priority scheduler, so visible items are always
//! served before speculative background work.
//!
//! # High-Level API
//!
//! The [`service`] module ties the pieces together:
//!
//! ```ignore
//! use std::sync::Arc;
//! use thumbcache::pipeline::Priority;
//! use thumbcache::renderer::ImageRenderer;
//! use thumbcache::service::{ThumbnailService, ThumbnailServiceConfig};
//!
//! let config = ThumbnailServiceConfig::default();
//! let service = ThumbnailService::start(config, Arc::new(ImageRenderer::default())).await?;
//!
//! let ticket = service.request("/photos/beach.jpg", Priority::Interactive);
//! if let Some(thumbnail) = ticket.wait().await {
//!     println!("{}x{}", thumbnail.width(), thumbnail.height());
//! }
//! ```

pub mod cache;
pub mod config;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod renderer;
pub mod service;

/// Version of the thumbcache library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
