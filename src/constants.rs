// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Capture cadence defaults
///
/// These are the values used when the configuration file does not override them.
pub mod timing {
    use super::Duration;

    /// Number of one-second ticks in the "take photo" countdown
    pub const COUNTDOWN_TICKS: u32 = 5;

    /// Length of a single countdown tick
    pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

    /// Pause after the countdown reaches zero so the final digit renders before the shutter
    pub const COUNTDOWN_SETTLE: Duration = Duration::from_millis(500);

    /// Interval of the live-feedback auto trigger
    pub const AUTO_ANALYZE_INTERVAL: Duration = Duration::from_secs(10);

    /// Upper bound on waiting for the first decodable frame after acquisition
    pub const SURFACE_READY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Longest a V4L2 capture thread waits for one buffer before rechecking its stop flag
    pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

    /// How often V4L2 device nodes are rescanned for topology changes
    pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(2);

    /// HTTP timeout for analysis requests
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Stream constraint defaults
pub mod constraints {
    /// Preferred capture width
    pub const IDEAL_WIDTH: u32 = 1280;
    /// Preferred capture height
    pub const IDEAL_HEIGHT: u32 = 720;
    /// Smallest acceptable capture width
    pub const MIN_WIDTH: u32 = 640;
    /// Smallest acceptable capture height
    pub const MIN_HEIGHT: u32 = 480;
}

/// Still image encoding
pub mod encoding {
    /// JPEG quality for captured frames (0-100)
    pub const JPEG_QUALITY: u8 = 80;

    /// MIME type of captured frames
    pub const JPEG_MIME: &str = "image/jpeg";

    /// Consecutive unencodable captures before the user is told
    pub const FAILURES_BEFORE_NOTICE: u32 = 3;
}

/// Virtual camera platform
pub mod virtual_camera {
    use std::time::Duration;

    /// Delay between opening a virtual stream and its first frame
    pub const WARMUP: Duration = Duration::from_millis(200);
    /// Frame interval (~30 fps)
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);
    /// Native size of generated test pattern cameras
    pub const PATTERN_SIZE: (u32, u32) = (640, 480);
}

/// Maximum number of user supplied style reference images
pub const MAX_STYLE_IMAGES: usize = 5;

/// Default analysis service base URL
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Environment variable overriding the analysis service base URL
pub const API_URL_ENV: &str = "FITCAM_API_URL";

/// Analysis endpoint paths
pub mod endpoints {
    /// Frame analysis
    pub const ANALYZE: &str = "/api/analyze";
    /// Style reference upload
    pub const UPLOAD_STYLE: &str = "/api/v1/upload-style";
    /// Stored style profiles, followed by `/{style_id}`
    pub const STYLES: &str = "/api/v1/styles";
    /// Service health
    pub const HEALTH: &str = "/health";
}

/// Image file extensions accepted for the upload fallback and style references
pub mod file_formats {
    /// Supported still image extensions (lowercase)
    pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

    /// Check if an extension (without dot) is a supported image
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}
