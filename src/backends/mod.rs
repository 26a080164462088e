// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera access
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  App Layer                   │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────────┐  ┌──────────────────┐  │
//! │  │ Camera (V4L2)   │  │ Virtual Camera   │  │
//! │  └─────────────────┘  └──────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: device API traits, prober, acquirer and the V4L2 platform
//! - [`virtual_camera`]: synthetic cameras, picture cameras and still image loading

pub mod camera;
pub mod virtual_camera;

use crate::errors::SourceError;
use camera::{Facing, MediaDevices};
use std::path::PathBuf;
use std::sync::Arc;

/// Camera platform selected on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlatformKind {
    /// `/dev/video*` devices
    #[default]
    V4l2,
    /// A front and a rear test pattern camera
    Virtual,
    /// A single virtual front camera showing a picture
    Image(PathBuf),
}

impl PlatformKind {
    pub fn from_flags(use_virtual: bool, image: Option<PathBuf>) -> Self {
        match (image, use_virtual) {
            (Some(path), _) => PlatformKind::Image(path),
            (None, true) => PlatformKind::Virtual,
            (None, false) => PlatformKind::V4l2,
        }
    }
}

/// Select the camera platform
///
/// Fails only when the picture for [`PlatformKind::Image`] cannot be loaded.
pub fn platform(kind: &PlatformKind) -> Result<Arc<dyn MediaDevices>, SourceError> {
    Ok(match kind {
        PlatformKind::V4l2 => Arc::new(camera::v4l2::V4l2Devices::new()),
        PlatformKind::Virtual => Arc::new(virtual_camera::VirtualDevices::front_and_rear()),
        PlatformKind::Image(path) => {
            let frame = virtual_camera::load_camera_frame(path)?;
            let label = path
                .file_name()
                .map(|name| format!("Picture {}", name.to_string_lossy()))
                .unwrap_or_else(|| "Picture".to_string());
            Arc::new(virtual_camera::VirtualDevices::from_image(
                &label,
                Some(Facing::User),
                frame,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_flag_wins() {
        let path = PathBuf::from("outfit.png");
        assert_eq!(
            PlatformKind::from_flags(true, Some(path.clone())),
            PlatformKind::Image(path)
        );
        assert_eq!(PlatformKind::from_flags(true, None), PlatformKind::Virtual);
        assert_eq!(PlatformKind::from_flags(false, None), PlatformKind::V4l2);
    }

    #[tokio::test]
    async fn test_image_platform_exposes_picture_size() {
        let path = std::env::temp_dir().join(format!("fitcam-platform-{}.png", uuid::Uuid::new_v4()));
        let image = image::RgbImage::from_pixel(800, 600, image::Rgb([90, 60, 30]));
        assert!(image.save(&path).is_ok());

        let devices = platform(&PlatformKind::Image(path.clone()));
        let _ = std::fs::remove_file(&path);
        let Ok(devices) = devices else {
            panic!("picture platform should load");
        };

        let cameras = devices.enumerate_devices().await.unwrap_or_default();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].facing, Some(Facing::User));
        assert_eq!(cameras[0].resolutions, vec![(800, 600)]);
        assert!(cameras[0].label.contains("fitcam-platform-"));
    }

    #[test]
    fn test_missing_picture_is_an_error() {
        let result = platform(&PlatformKind::Image(PathBuf::from("/nonexistent/fitcam.png")));
        assert!(matches!(result, Err(SourceError::Read { .. })));
    }
}
