// SPDX-License-Identifier: GPL-3.0-only

//! Request shaping for the analysis endpoint

use super::style::StyleReferenceSet;
use crate::pipelines::photo::CaptureFrame;
use base64::Engine;
use base64::engine::general_purpose;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// What the user wants feedback on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// General outfit feedback
    #[default]
    Outfit,
    /// Feedback relative to the style reference set
    Style,
}

impl CaptureMode {
    /// Wire mode sent to the service
    pub fn analysis_mode(self) -> AnalysisMode {
        match self {
            CaptureMode::Outfit => AnalysisMode::General,
            CaptureMode::Style => AnalysisMode::Style,
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Outfit => write!(f, "outfit"),
            CaptureMode::Style => write!(f, "style"),
        }
    }
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "outfit" | "general" => Ok(CaptureMode::Outfit),
            "style" => Ok(CaptureMode::Style),
            other => Err(format!("unknown mode: {} (expected outfit or style)", other)),
        }
    }
}

/// Mode as understood by the analysis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    General,
    Style,
}

/// Season used for context-aware recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    /// Meteorological season of a month (1-12), northern hemisphere
    pub fn for_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    /// Season of the current local date
    pub fn current() -> Self {
        Self::for_month(chrono::Local::now().month())
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" | "fall" => Ok(Season::Autumn),
            "winter" => Ok(Season::Winter),
            other => Err(format!("unknown season: {}", other)),
        }
    }
}

/// Style reference images as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleProfile {
    /// Base64 encoded JPEG images, in upload order
    pub images: Vec<String>,
}

/// Body of `POST /api/analyze`
///
/// Built once per capture by [`build_request`] and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    mode: AnalysisMode,
    frame_b64: String,
    season: Season,
    style_profile: Option<StyleProfile>,
}

impl AnalysisRequest {
    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn frame_b64(&self) -> &str {
        &self.frame_b64
    }

    pub fn season(&self) -> Season {
        self.season
    }

    pub fn style_profile(&self) -> Option<&StyleProfile> {
        self.style_profile.as_ref()
    }
}

/// Package a captured frame and its context into a request
///
/// Pure: the same inputs always produce an identical request. The style
/// profile is only attached when the reference set is non-empty.
pub fn build_request(
    frame: &CaptureFrame,
    mode: CaptureMode,
    season: Season,
    styles: &StyleReferenceSet,
) -> AnalysisRequest {
    AnalysisRequest {
        mode: mode.analysis_mode(),
        frame_b64: general_purpose::STANDARD.encode(frame.bytes()),
        season,
        style_profile: styles.to_profile(),
    }
}
