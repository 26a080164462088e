// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::errors::{AcquisitionError, AcquisitionResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which physical camera is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Front camera, pointing at the user
    #[default]
    User,
    /// Rear camera, pointing away from the user
    Environment,
}

impl Facing {
    /// The opposite facing direction
    pub fn toggled(self) -> Self {
        match self {
            Facing::User => Facing::Environment,
            Facing::Environment => Facing::User,
        }
    }

    /// Guess the facing direction from a location hint or device label
    ///
    /// Recognizes libcamera style locations ("front", "back") and common
    /// words in V4L2 card names. Returns `None` for external or unknown cameras.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.to_lowercase();
        if hint.contains("front") || hint.contains("user") || hint.contains("selfie") {
            Some(Facing::User)
        } else if hint.contains("back")
            || hint.contains("rear")
            || hint.contains("environment")
            || hint.contains("world")
        {
            Some(Facing::Environment)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::User => write!(f, "user"),
            Facing::Environment => write!(f, "environment"),
        }
    }
}

impl std::str::FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "front" => Ok(Facing::User),
            "environment" | "back" | "rear" => Ok(Facing::Environment),
            other => Err(format!("unknown facing direction: {}", other)),
        }
    }
}

/// Camera permission state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    /// Platform cannot answer the question
    #[default]
    Unknown,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionState::Granted => write!(f, "granted"),
            PermissionState::Denied => write!(f, "denied"),
            PermissionState::Prompt => write!(f, "prompt"),
            PermissionState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Kind of media device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
    pub facing: Option<Facing>,         // None for external or unknown cameras
    pub resolutions: Vec<(u32, u32)>,   // Native capture sizes, largest first when known
}

/// Facing requirement of a constraint set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingConstraint {
    /// Only a camera with exactly this facing is acceptable
    Exact(Facing),
    /// Prefer this facing but accept any camera
    Ideal(Facing),
}

impl FacingConstraint {
    pub fn facing(&self) -> Facing {
        match self {
            FacingConstraint::Exact(f) | FacingConstraint::Ideal(f) => *f,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, FacingConstraint::Exact(_))
    }
}

/// Desired and minimum value for one dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionConstraint {
    pub ideal: u32,
    pub min: u32,
}

/// Focus mode requested from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    #[default]
    Continuous,
    Manual,
}

/// One set of constraints handed to `MediaDevices::get_user_media`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingConstraint,
    pub width: DimensionConstraint,
    pub height: DimensionConstraint,
    pub focus_mode: FocusMode,
}

impl StreamConstraints {
    /// Ordered constraint variants for a start request, tried first to last
    ///
    /// The exact facing match comes first, then the relaxed ("ideal") variant.
    pub fn fallback_chain(
        facing: Facing,
        width: DimensionConstraint,
        height: DimensionConstraint,
    ) -> [StreamConstraints; 2] {
        let exact = StreamConstraints {
            facing: FacingConstraint::Exact(facing),
            width,
            height,
            focus_mode: FocusMode::Continuous,
        };
        let relaxed = StreamConstraints {
            facing: FacingConstraint::Ideal(facing),
            ..exact
        };
        [exact, relaxed]
    }

    /// Pick the camera these constraints select from a device list
    pub fn select_device<'a>(
        &self,
        devices: &'a [CameraDevice],
    ) -> AcquisitionResult<&'a CameraDevice> {
        let video: Vec<&CameraDevice> = devices
            .iter()
            .filter(|d| d.kind == DeviceKind::VideoInput)
            .collect();

        let first = *video.first().ok_or(AcquisitionError::DeviceNotFound)?;
        let wanted = self.facing.facing();
        let matching = video.iter().copied().find(|d| d.facing == Some(wanted));

        match self.facing {
            FacingConstraint::Exact(_) => {
                matching.ok_or(AcquisitionError::ConstraintsNotSatisfiable)
            }
            FacingConstraint::Ideal(_) => Ok(matching.unwrap_or(first)),
        }
    }

    /// Pick the capture size closest to the ideal that meets the minimum
    ///
    /// An empty `available` list means the device accepts any size, so the
    /// ideal is returned.
    pub fn pick_resolution(&self, available: &[(u32, u32)]) -> AcquisitionResult<(u32, u32)> {
        if available.is_empty() {
            return Ok((self.width.ideal, self.height.ideal));
        }

        available
            .iter()
            .copied()
            .filter(|&(w, h)| self.accepts(w, h))
            .min_by_key(|&(w, h)| w.abs_diff(self.width.ideal) + h.abs_diff(self.height.ideal))
            .ok_or(AcquisitionError::ConstraintsNotSatisfiable)
    }

    /// Whether a negotiated size meets the minimum
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        width >= self.width.min && height >= self.height.min
    }
}

impl std::fmt::Display for StreamConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.facing.is_exact() { "exact" } else { "ideal" };
        write!(
            f,
            "facing {} {} {}x{} (min {}x{})",
            mode,
            self.facing.facing(),
            self.width.ideal,
            self.height.ideal,
            self.width.min,
            self.height.min
        )
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// Motion JPEG - each frame is a complete JPEG image
    MJPEG,
}

impl PixelFormat {
    /// Bytes needed for an uncompressed frame, `None` for compressed formats
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::RGBA => Some(pixels * 4),
            PixelFormat::RGB24 => Some(pixels * 3),
            PixelFormat::YUYV => Some(pixels * 2),
            PixelFormat::MJPEG => None,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Frame data in `format`
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes (0 for compressed formats)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// A frame is decodable once it has non-zero dimensions and enough bytes
    pub fn is_decodable(&self) -> bool {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            return false;
        }
        match self.format.frame_size(self.width, self.height) {
            Some(expected) => self.data.len() >= expected,
            None => true,
        }
    }
}

/// Settings of the live track, as negotiated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSettings {
    pub device_id: String,
    pub label: String,
    pub facing: Option<Facing>,
    pub width: u32,
    pub height: u32,
}

/// Sender half feeding frames to a video surface
pub type FrameSender = tokio::sync::watch::Sender<Option<Arc<CameraFrame>>>;

/// Receiver half read by a video surface
pub type FrameReceiver = tokio::sync::watch::Receiver<Option<Arc<CameraFrame>>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, facing: Option<Facing>) -> CameraDevice {
        CameraDevice {
            id: id.to_string(),
            label: id.to_string(),
            kind: DeviceKind::VideoInput,
            facing,
            resolutions: vec![(1920, 1080), (1280, 720), (640, 480)],
        }
    }

    fn chain(facing: Facing) -> [StreamConstraints; 2] {
        StreamConstraints::fallback_chain(
            facing,
            DimensionConstraint { ideal: 1280, min: 640 },
            DimensionConstraint { ideal: 720, min: 480 },
        )
    }

    #[test]
    fn test_fallback_chain_order() {
        let [first, second] = chain(Facing::Environment);
        assert_eq!(first.facing, FacingConstraint::Exact(Facing::Environment));
        assert_eq!(second.facing, FacingConstraint::Ideal(Facing::Environment));
        assert_eq!(first.width, second.width);
    }

    #[test]
    fn test_exact_requires_matching_facing() {
        let devices = vec![device("front", Some(Facing::User))];
        let [exact, ideal] = chain(Facing::Environment);

        assert_eq!(
            exact.select_device(&devices),
            Err(AcquisitionError::ConstraintsNotSatisfiable)
        );
        assert_eq!(ideal.select_device(&devices).map(|d| d.id.as_str()), Ok("front"));
    }

    #[test]
    fn test_ideal_prefers_matching_facing() {
        let devices = vec![
            device("front", Some(Facing::User)),
            device("rear", Some(Facing::Environment)),
        ];
        let [_, ideal] = chain(Facing::Environment);
        assert_eq!(ideal.select_device(&devices).map(|d| d.id.as_str()), Ok("rear"));
    }

    #[test]
    fn test_no_devices() {
        let [exact, ideal] = chain(Facing::User);
        assert_eq!(exact.select_device(&[]), Err(AcquisitionError::DeviceNotFound));
        assert_eq!(ideal.select_device(&[]), Err(AcquisitionError::DeviceNotFound));
    }

    #[test]
    fn test_pick_resolution() {
        let [exact, _] = chain(Facing::User);
        assert_eq!(
            exact.pick_resolution(&[(1920, 1080), (1280, 720), (640, 480)]),
            Ok((1280, 720))
        );
        assert_eq!(
            exact.pick_resolution(&[(320, 240)]),
            Err(AcquisitionError::ConstraintsNotSatisfiable)
        );
        assert_eq!(exact.pick_resolution(&[]), Ok((1280, 720)));
    }

    #[test]
    fn test_facing_hint() {
        assert_eq!(Facing::from_hint("front"), Some(Facing::User));
        assert_eq!(Facing::from_hint("Rear Camera"), Some(Facing::Environment));
        assert_eq!(Facing::from_hint("HD Pro Webcam C920"), None);
    }

    #[test]
    fn test_zero_sized_frame_not_decodable() {
        let frame = CameraFrame {
            width: 0,
            height: 0,
            data: Arc::from(Vec::new()),
            format: PixelFormat::RGBA,
            stride: 0,
            captured_at: Instant::now(),
        };
        assert!(!frame.is_decodable());
    }
}
