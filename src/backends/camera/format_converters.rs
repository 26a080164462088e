// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for camera frames
//!
//! Everything is converted to packed RGB24 before JPEG encoding. Row strides
//! wider than the visible width (padding added by drivers) are skipped.

use super::types::{CameraFrame, PixelFormat};

/// Convert YUYV (YUV 4:2:2) to RGB24
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let row_bytes = width as usize * 2;
    let stride = (stride as usize).max(row_bytes);
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);

    for row in data.chunks(stride).take(height as usize) {
        let row = &row[..row_bytes.min(row.len())];
        for chunk in row.chunks_exact(4) {
            let y0 = chunk[0] as f32;
            let u = chunk[1] as f32 - 128.0;
            let y1 = chunk[2] as f32;
            let v = chunk[3] as f32 - 128.0;

            for y in [y0, y1] {
                rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
                rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
                rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
            }
        }
    }

    rgb
}

/// Drop the alpha channel of RGBA rows
pub fn rgba_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    strip_rows(data, width as usize * 4, height, stride)
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}

/// Copy the visible part of each row, removing stride padding
fn strip_rows(data: &[u8], row_bytes: usize, height: u32, stride: u32) -> Vec<u8> {
    let stride = (stride as usize).max(row_bytes);
    if stride == row_bytes {
        return data[..(row_bytes * height as usize).min(data.len())].to_vec();
    }

    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        out.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }
    out
}

/// Convert an uncompressed frame to packed RGB24
///
/// Returns `None` for compressed formats, which must be decoded instead.
pub fn frame_to_rgb(frame: &CameraFrame) -> Option<Vec<u8>> {
    let (w, h, stride) = (frame.width, frame.height, frame.stride);
    match frame.format {
        PixelFormat::RGBA => Some(rgba_to_rgb(&frame.data, w, h, stride)),
        PixelFormat::RGB24 => Some(strip_rows(&frame.data, w as usize * 3, h, stride)),
        PixelFormat::YUYV => Some(yuyv_to_rgb(&frame.data, w, h, stride)),
        PixelFormat::MJPEG => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_white() {
        // Y=255, U=128, V=128 for both pixels
        let yuyv = vec![255u8, 128, 255, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1, 4);

        assert_eq!(rgb.len(), 6);
        assert!(rgb.iter().all(|&c| c > 250));
    }

    #[test]
    fn test_rgba_to_rgb_skips_padding() {
        // 1x2 image with 4 bytes of row padding
        let rgba = vec![
            1, 2, 3, 255, 0, 0, 0, 0, //
            4, 5, 6, 255, 0, 0, 0, 0,
        ];
        let rgb = rgba_to_rgb(&rgba, 1, 2, 8);
        assert_eq!(rgb, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_rgba_to_rgb_packed() {
        let rgba = vec![255, 128, 64, 255, 0, 0, 0, 255];
        assert_eq!(rgba_to_rgb(&rgba, 2, 1, 8), vec![255, 128, 64, 0, 0, 0]);
    }
}
