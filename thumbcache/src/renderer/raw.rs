//! Uncompressed raster produced by renderers and stored in the memory cache.

use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::cache::SizeEstimate;

/// Shared handle to a finished thumbnail.
///
/// Thumbnails are handed to every coalesced caller and kept in the memory
/// cache at the same time, so they are reference counted rather than cloned.
pub type Thumbnail = Arc<RawImage>;

/// Pixel layout of a [`RawImage`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit grayscale
    Luma8,
    /// 8-bit RGB
    Rgb8,
    /// 8-bit RGB with alpha
    Rgba8,
}

impl PixelFormat {
    /// Number of bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Bit depth of one pixel.
    pub fn bits_per_pixel(self) -> u32 {
        self.channels() as u32 * 8
    }
}

/// A decoded, uncompressed image.
///
/// The pixel buffer length always equals `width * height * channels`.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl RawImage {
    /// Wrap a pixel buffer, returning `None` if its length does not match the
    /// dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(format.channels())?;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Convert a decoded image, keeping 8-bit layouts and widening the rest to RGBA8.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let (format, width, height, pixels) = match image {
            DynamicImage::ImageLuma8(buf) => {
                (PixelFormat::Luma8, buf.width(), buf.height(), buf.into_raw())
            }
            DynamicImage::ImageRgb8(buf) => {
                (PixelFormat::Rgb8, buf.width(), buf.height(), buf.into_raw())
            }
            other => {
                let buf = other.into_rgba8();
                (PixelFormat::Rgba8, buf.width(), buf.height(), buf.into_raw())
            }
        };
        Self {
            width,
            height,
            format,
            pixels,
        }
    }

    /// Copy into an `image` buffer for encoding.
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        let pixels = self.pixels.clone();
        match self.format {
            PixelFormat::Luma8 => {
                GrayImage::from_raw(self.width, self.height, pixels).map(DynamicImage::ImageLuma8)
            }
            PixelFormat::Rgb8 => {
                RgbImage::from_raw(self.width, self.height, pixels).map(DynamicImage::ImageRgb8)
            }
            PixelFormat::Rgba8 => {
                RgbaImage::from_raw(self.width, self.height, pixels).map(DynamicImage::ImageRgba8)
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory footprint derived from dimensions and bit depth.
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bits_per_pixel() as u64 / 8
    }
}

impl SizeEstimate for RawImage {
    fn size_estimate(&self) -> u64 {
        self.byte_size()
    }
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
