//! Renderer abstraction for producing raw thumbnails from source media.
//!
//! Pixel decoding and video frame extraction are platform concerns, so the
//! pipeline only depends on the [`Renderer`] trait. An implementation may run
//! on the blocking pool, hop to a dedicated thread for APIs with thread
//! affinity, or shell out to a subprocess; the pipeline only requires that
//! `render` is safe to call concurrently up to the render gate's limit.
//!
//! [`ImageRenderer`] is the bundled implementation for still images.

mod image_renderer;
mod raw;

pub use image_renderer::{is_supported_image, ImageRenderer, DEFAULT_THUMBNAIL_SIZE};
pub use raw::{PixelFormat, RawImage, Thumbnail};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors a renderer can report.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The source file does not exist (or vanished mid-render).
    #[error("source not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The source exists but could not be decoded.
    #[error("failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// The renderer does not handle this kind of media.
    #[error("unsupported media type: {}", .0.display())]
    Unsupported(PathBuf),

    /// I/O error while reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking render task panicked or was cancelled.
    #[error("render task failed: {0}")]
    TaskFailed(String),
}

/// Produces a raw thumbnail image from a source path.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use thumbcache::renderer::{BoxFuture, PixelFormat, RawImage, RenderError, Renderer};
///
/// struct SolidRenderer;
///
/// impl Renderer for SolidRenderer {
///     fn render<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<RawImage, RenderError>> {
///         Box::pin(async {
///             Ok(RawImage::new(2, 2, PixelFormat::Luma8, vec![0; 4]).expect("valid buffer"))
///         })
///     }
/// }
/// ```
pub trait Renderer: Send + Sync + 'static {
    /// Render a thumbnail for the file at `path`.
    fn render<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<RawImage, RenderError>>;

    /// Short name used in log output.
    fn name(&self) -> &str {
        "renderer"
    }
}
