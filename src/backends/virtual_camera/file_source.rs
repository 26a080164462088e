// SPDX-License-Identifier: GPL-3.0-only

//! Still images loaded from disk
//!
//! Used for the upload fallback (a photo file analyzed instead of the live
//! camera), for style reference images, and to feed a virtual camera from a
//! picture.

use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::constants::{encoding, file_formats};
use crate::errors::SourceError;
use crate::pipelines::photo::CaptureFrame;
use crate::pipelines::photo::encoding::encode_jpeg;
use image::ImageFormat;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Load an image file as an encoded still
///
/// JPEG files are passed through untouched; other formats are re-encoded to
/// JPEG because the analysis service only accepts JPEG payloads.
pub async fn load_still_image(path: &Path) -> Result<CaptureFrame, SourceError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !file_formats::is_image_extension(&extension) {
        return Err(SourceError::Unsupported(format!(
            "{} (expected one of: {})",
            path.display(),
            file_formats::IMAGE_EXTENSIONS.join(", ")
        )));
    }

    info!(path = %path.display(), "Loading image file");
    let bytes = tokio::fs::read(path).await.map_err(|e| SourceError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    tokio::task::spawn_blocking(move || still_from_bytes(bytes))
        .await
        .map_err(|e| SourceError::Unsupported(format!("decode task failed: {}", e)))?
}

fn still_from_bytes(bytes: Vec<u8>) -> Result<CaptureFrame, SourceError> {
    let format =
        image::guess_format(&bytes).map_err(|e| SourceError::Unsupported(e.to_string()))?;
    let img = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| SourceError::Unsupported(e.to_string()))?;
    let (width, height) = (img.width(), img.height());

    if format == ImageFormat::Jpeg {
        debug!(width, height, "Using JPEG file as-is");
        return Ok(CaptureFrame::new(bytes, encoding::JPEG_MIME, width, height));
    }

    debug!(?format, width, height, "Re-encoding image as JPEG");
    let rgb = img.to_rgb8();
    let jpeg = encode_jpeg(rgb.as_raw(), width, height, encoding::JPEG_QUALITY)
        .map_err(SourceError::Unsupported)?;
    Ok(CaptureFrame::new(jpeg, encoding::JPEG_MIME, width, height))
}

/// Read a picture from disk as the frame of a virtual camera
pub fn load_camera_frame(path: &Path) -> Result<CameraFrame, SourceError> {
    let bytes = std::fs::read(path).map_err(|e| SourceError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let frame = decode_to_frame(&bytes)?;
    info!(path = %path.display(), width = frame.width, height = frame.height, "Picture camera source loaded");
    Ok(frame)
}

/// Decode image bytes into an RGBA camera frame
pub fn decode_to_frame(bytes: &[u8]) -> Result<CameraFrame, SourceError> {
    let img = image::load_from_memory(bytes).map_err(|e| SourceError::Unsupported(e.to_string()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(CameraFrame {
        width,
        height,
        data: Arc::from(rgba.into_raw()),
        format: PixelFormat::RGBA,
        stride: width * 4,
        captured_at: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        let mut buffer = Vec::new();
        let written = img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png);
        assert!(written.is_ok());
        buffer
    }

    #[test]
    fn test_png_is_reencoded_as_jpeg() {
        let still = still_from_bytes(png_bytes(20, 10));
        let Ok(still) = still else {
            panic!("png should load");
        };
        assert_eq!(still.mime_type(), "image/jpeg");
        assert_eq!((still.width(), still.height()), (20, 10));
        assert_eq!(&still.bytes()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_garbage_is_unsupported() {
        assert!(matches!(
            still_from_bytes(b"not an image".to_vec()),
            Err(SourceError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_unknown_extension() {
        let result = load_still_image(Path::new("/tmp/outfit.txt")).await;
        assert!(matches!(result, Err(SourceError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = load_still_image(Path::new("/nonexistent/fitcam/outfit.jpg")).await;
        assert!(matches!(result, Err(SourceError::Read { .. })));
    }

    #[test]
    fn test_decode_to_frame() {
        let frame = decode_to_frame(&png_bytes(4, 2));
        assert!(frame.is_ok_and(|f| f.width == 4 && f.height == 2 && f.is_decodable()));
    }
}
