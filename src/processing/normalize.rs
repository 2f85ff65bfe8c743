//! # Normalization Pipeline
//!
//! Every image that reaches the network goes through the same three steps:
//!
//! 1. **Decode** (file path only): picked file bytes → [`DecodedBitmap`]
//! 2. **Draw**: raster → [`NormalizedImage`] bounded by a maximum width,
//!    aspect ratio preserved (see `plantia_scale::presets::plan_for_width`)
//! 3. **Export**: [`NormalizedImage`] → [`JpegPayload`]
//!
//! Decoded bitmaps are closed explicitly as soon as they have been drawn so
//! that a full-resolution photo and its downscaled copy never coexist for
//! longer than the draw itself.

use std::fmt;

use fast_image_resize::Resizer;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use plantia_scale::cpu::scale_rgba_cpu;
use plantia_scale::presets::{Size, plan_for_width};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Where an image came from; selects the width bound and JPEG quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    /// A frame grabbed from a running camera stream
    LiveCapture,
    /// A file chosen through the file picker or the native camera chooser
    FileUpload,
}

impl fmt::Display for ImageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageOrigin::LiveCapture => write!(f, "live_capture"),
            ImageOrigin::FileUpload => write!(f, "file_upload"),
        }
    }
}

/// Full-resolution raster decoded from a picked file.
///
/// Call [`DecodedBitmap::close`] once it has been drawn.
#[derive(Debug)]
pub struct DecodedBitmap {
    image: RgbaImage,
}

impl DecodedBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.image
    }

    /// Releases the pixel buffer.
    pub fn close(self) {
        debug!(width = self.width(), height = self.height(), "bitmap closed");
        drop(self.image);
    }
}

/// Decode picked file bytes into an RGBA bitmap.
///
/// Any failure (unknown format, truncated data, allocation limits) is
/// reported as [`ClientError::Decode`].
pub fn decode_bitmap_blocking(bytes: &[u8]) -> ClientResult<DecodedBitmap> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ClientError::decode(e.to_string()))?;
    let image = decoded.into_rgba8();
    debug!(width = image.width(), height = image.height(), "bitmap decoded");
    Ok(DecodedBitmap { image })
}

/// Asynchronous decode; the work runs on the blocking pool so the caller's
/// task keeps servicing other events.
pub async fn decode_bitmap(bytes: Vec<u8>) -> ClientResult<DecodedBitmap> {
    tokio::task::spawn_blocking(move || decode_bitmap_blocking(&bytes))
        .await
        .map_err(|e| ClientError::decode(format!("decoder task failed: {}", e)))?
}

/// Width-bounded raster ready for export. Consumed by [`encode_jpeg`].
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: RgbaImage,
    origin: ImageOrigin,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn origin(&self) -> ImageOrigin {
        self.origin
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Drawing surface (the canvas): owns the resizer so that its scratch
/// buffers are reused across draws.
pub struct Surface {
    resizer: Resizer,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Draw `source` at a width of at most `max_width`, height scaled by the
    /// same ratio.
    pub fn draw_bounded(
        &mut self,
        source: &RgbaImage,
        max_width: u32,
        origin: ImageOrigin,
    ) -> ClientResult<NormalizedImage> {
        let input = Size {
            w: source.width(),
            h: source.height(),
        };
        if input.w == 0 || input.h == 0 {
            return Err(ClientError::encode("source image has no pixels"));
        }
        let plan = plan_for_width(input, max_width);
        let mut dst = vec![0u8; plan.out_len()];
        scale_rgba_cpu(&mut self.resizer, source.as_raw(), &plan, &mut dst)?;

        let pixels = RgbaImage::from_raw(plan.out.w, plan.out.h, dst)
            .ok_or_else(|| ClientError::encode("surface buffer does not match its dimensions"))?;
        debug!(
            %origin,
            in_w = input.w,
            in_h = input.h,
            out_w = plan.out.w,
            out_h = plan.out.h,
            "image drawn"
        );
        Ok(NormalizedImage { pixels, origin })
    }
}

/// Encoded JPEG blob handed to the transport.
#[derive(Debug, Clone)]
pub struct JpegPayload {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub origin: ImageOrigin,
}

/// Export a normalized image as JPEG. `None` keeps the encoder's default quality.
pub fn encode_jpeg(image: NormalizedImage, quality: Option<u8>) -> ClientResult<JpegPayload> {
    let (width, height, origin) = (image.width(), image.height(), image.origin);
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(image.pixels).into_rgb8();

    let mut bytes = Vec::new();
    let mut encoder = match quality {
        Some(q) => JpegEncoder::new_with_quality(&mut bytes, q),
        None => JpegEncoder::new(&mut bytes),
    };
    encoder
        .encode_image(&rgb)
        .map_err(|e| ClientError::encode(e.to_string()))?;

    if bytes.is_empty() {
        return Err(ClientError::encode("encoder produced an empty blob"));
    }
    debug!(%origin, len = bytes.len(), ?quality, "jpeg exported");
    Ok(JpegPayload {
        bytes,
        width,
        height,
        origin,
    })
}
