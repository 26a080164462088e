// SPDX-License-Identifier: MPL-2.0

//! Still photo pipeline
//!
//! ```text
//! VideoSurface → FrameCapturer → PhotoEncoder → CaptureFrame
//!       ↓
//! Stream continues uninterrupted
//! ```
//!
//! A [`CaptureFrame`] is immutable once produced. It is handed to the analysis
//! pipeline for exactly one request and dropped afterwards.

pub mod capture;
pub mod encoding;

pub use capture::FrameCapturer;
pub use encoding::PhotoEncoder;

use std::sync::Arc;

/// An encoded still image
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureFrame {
    bytes: Arc<[u8]>,
    mime_type: String,
    width: u32,
    height: u32,
}

impl CaptureFrame {
    pub fn new(bytes: Vec<u8>, mime_type: &str, width: u32, height: u32) -> Self {
        Self {
            bytes: Arc::from(bytes),
            mime_type: mime_type.to_string(),
            width,
            height,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl std::fmt::Debug for CaptureFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFrame")
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}
