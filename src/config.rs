// SPDX-License-Identifier: GPL-3.0-only

use crate::analysis::{CaptureMode, Season};
use crate::backends::camera::{DimensionConstraint, Facing};
use crate::constants::{self, constraints, encoding, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the application config directory
const APP_DIR: &str = "fitcam";

/// Config file name inside the application config directory
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the analysis service
    pub api_base_url: String,
    /// HTTP timeout for analysis requests
    pub request_timeout_secs: u64,
    /// Camera requested when a session starts
    pub default_facing: Facing,
    /// Outfit or style feedback
    pub capture_mode: CaptureMode,
    /// Fixed season; derived from the current month when unset
    pub season: Option<Season>,
    /// Number of one-second countdown ticks before the shutter
    pub countdown_seconds: u32,
    /// Delay between the countdown reaching zero and the shutter
    pub countdown_settle_ms: u64,
    /// Interval of the live-feedback auto trigger
    pub auto_analyze_interval_secs: u64,
    /// Whether the periodic auto trigger runs at all
    pub live_feedback: bool,
    /// Upper bound on waiting for the first frame after acquisition
    pub ready_timeout_secs: u64,
    /// JPEG quality of captured frames (1-100)
    pub jpeg_quality: u8,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: timing::REQUEST_TIMEOUT.as_secs(),
            default_facing: Facing::User,
            capture_mode: CaptureMode::Outfit,
            season: None,
            countdown_seconds: timing::COUNTDOWN_TICKS,
            countdown_settle_ms: timing::COUNTDOWN_SETTLE.as_millis() as u64,
            auto_analyze_interval_secs: timing::AUTO_ANALYZE_INTERVAL.as_secs(),
            live_feedback: true,
            ready_timeout_secs: timing::SURFACE_READY_TIMEOUT.as_secs(),
            jpeg_quality: encoding::JPEG_QUALITY,
            ideal_width: constraints::IDEAL_WIDTH,
            ideal_height: constraints::IDEAL_HEIGHT,
            min_width: constraints::MIN_WIDTH,
            min_height: constraints::MIN_HEIGHT,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load the config from its default location
    ///
    /// A missing file (or a missing config directory) yields the defaults.
    /// `FITCAM_API_URL` overrides the stored endpoint.
    pub fn load() -> AppResult<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            Some(path) => {
                debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(constants::API_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                debug!(%url, "Analysis endpoint overridden from environment");
                self.api_base_url = url.to_string();
            }
        }
    }

    /// Season sent with requests
    pub fn effective_season(&self) -> Season {
        self.season.unwrap_or_else(Season::current)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn width_constraint(&self) -> DimensionConstraint {
        DimensionConstraint {
            ideal: self.ideal_width,
            min: self.min_width.min(self.ideal_width),
        }
    }

    pub fn height_constraint(&self) -> DimensionConstraint {
        DimensionConstraint {
            ideal: self.ideal_height,
            min: self.min_height.min(self.ideal_height),
        }
    }

    /// Timings of the capture scheduler
    pub fn schedule(&self) -> Schedule {
        Schedule {
            countdown_ticks: self.countdown_seconds,
            countdown_tick: timing::COUNTDOWN_TICK,
            settle: Duration::from_millis(self.countdown_settle_ms),
            auto_interval: (self.live_feedback && self.auto_analyze_interval_secs > 0)
                .then(|| Duration::from_secs(self.auto_analyze_interval_secs)),
            ready_timeout: Duration::from_secs(self.ready_timeout_secs),
        }
    }
}

/// Capture cadence used by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub countdown_ticks: u32,
    pub countdown_tick: Duration,
    pub settle: Duration,
    /// `None` disables the periodic trigger
    pub auto_interval: Option<Duration>,
    pub ready_timeout: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Config::default().schedule()
    }
}
