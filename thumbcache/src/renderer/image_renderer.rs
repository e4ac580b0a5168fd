//! Still-image renderer backed by the `image` crate.

use std::io;
use std::path::{Path, PathBuf};

use image::ImageReader;
use tracing::trace;

use super::{BoxFuture, RawImage, RenderError, Renderer};

/// Default bounding box edge for generated thumbnails, in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

/// Whether the path has an extension [`ImageRenderer`] can decode.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Decodes still images on the blocking pool and downsizes them to fit a
/// square bound, preserving aspect ratio. Output is always RGBA8.
///
/// Video and other non-image sources yield [`RenderError::Unsupported`].
#[derive(Debug, Clone)]
pub struct ImageRenderer {
    max_dimension: u32,
}

impl ImageRenderer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_SIZE)
    }
}

impl Renderer for ImageRenderer {
    fn render<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<RawImage, RenderError>> {
        let owned = path.to_path_buf();
        let max_dimension = self.max_dimension;
        Box::pin(async move {
            tokio::task::spawn_blocking(move || render_blocking(&owned, max_dimension))
                .await
                .map_err(|e| RenderError::TaskFailed(e.to_string()))?
        })
    }

    fn name(&self) -> &str {
        "image"
    }
}

fn render_blocking(path: &Path, max_dimension: u32) -> Result<RawImage, RenderError> {
    let reader = ImageReader::open(path).map_err(|e| open_error(path, e))?;
    let reader = reader.with_guessed_format()?;
    if reader.format().is_none() {
        return Err(RenderError::Unsupported(path.to_path_buf()));
    }

    let image = reader.decode().map_err(|e| RenderError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (width, height) = (image.width(), image.height());
    let image = if width > max_dimension || height > max_dimension {
        image.thumbnail(max_dimension, max_dimension)
    } else {
        image
    };

    trace!(
        path = %path.display(),
        source_width = width,
        source_height = height,
        width = image.width(),
        height = image.height(),
        "Rendered thumbnail"
    );

    Ok(RawImage::from_dynamic(image::DynamicImage::ImageRgba8(
        image.into_rgba8(),
    )))
}

fn open_error(path: &Path, error: io::Error) -> RenderError {
    if error.kind() == io::ErrorKind::NotFound {
        RenderError::NotFound(PathBuf::from(path))
    } else {
        RenderError::Io(error)
    }
}
