// SPDX-License-Identifier: GPL-3.0-only

//! Still image encoding
//!
//! Camera frames arrive as RGBA, RGB24, YUYV or MJPEG and always leave as a
//! JPEG at the configured quality. Encoding is CPU bound and runs on the
//! blocking pool.

use super::CaptureFrame;
use crate::backends::camera::format_converters::frame_to_rgb;
use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::constants::encoding;
use image::ImageFormat;
use std::sync::Arc;
use tracing::debug;

/// JPEG encoder for captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoEncoder {
    quality: u8,
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new(encoding::JPEG_QUALITY)
    }
}

impl PhotoEncoder {
    /// Create an encoder; quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a frame at its native resolution
    pub async fn encode(&self, frame: Arc<CameraFrame>) -> Result<CaptureFrame, String> {
        let quality = self.quality;
        tokio::task::spawn_blocking(move || encode_frame(&frame, quality))
            .await
            .map_err(|e| format!("Encoding task error: {}", e))?
    }
}

fn encode_frame(frame: &CameraFrame, quality: u8) -> Result<CaptureFrame, String> {
    let (rgb, width, height) = match frame.format {
        PixelFormat::MJPEG => {
            // Decode first: UVC MJPEG payloads often omit the Huffman tables
            let img = image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
                .map_err(|e| format!("MJPEG decode failed: {}", e))?
                .to_rgb8();
            let (w, h) = img.dimensions();
            (img.into_raw(), w, h)
        }
        _ => {
            let rgb = frame_to_rgb(frame).ok_or("unsupported pixel format")?;
            (rgb, frame.width, frame.height)
        }
    };

    if width == 0 || height == 0 || rgb.len() < width as usize * height as usize * 3 {
        return Err(format!("incomplete frame {}x{}", width, height));
    }

    let bytes = encode_jpeg(&rgb, width, height, quality)?;
    debug!(width, height, size = bytes.len(), quality, "Frame encoded");
    Ok(CaptureFrame::new(bytes, encoding::JPEG_MIME, width, height))
}

/// Encode packed RGB24 as JPEG
pub fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(
            &rgb[..width as usize * height as usize * 3],
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| format!("JPEG encoding failed: {}", e))?;

    Ok(buffer)
}
