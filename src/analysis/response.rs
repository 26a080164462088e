// SPDX-License-Identifier: GPL-3.0-only

//! Response types of the analysis service

use crate::errors::AnalysisError;
use serde::{Deserialize, Serialize};

/// How urgent a piece of feedback is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

fn default_actionable() -> bool {
    true
}

/// One piece of feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// Free-form category such as `top`, `footwear`, `color` or `overall`
    #[serde(rename = "type")]
    pub category: String,
    pub message: String,
    pub priority: Priority,
    /// Confidence in [0, 1]
    pub confidence: f32,
    #[serde(default = "default_actionable")]
    pub actionable: bool,
}

/// Data for drawing on top of the preview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayData {
    pub bounding_boxes: Vec<serde_json::Value>,
    pub keypoints: Vec<serde_json::Value>,
    /// Base64 encoded masks
    pub segmentation_masks: Vec<String>,
    pub guide_lines: Vec<serde_json::Value>,
    pub color_analysis: Option<serde_json::Value>,
}

/// Raw body of a `POST /api/analyze` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub feedback: Vec<FeedbackItem>,
    #[serde(default)]
    pub overlay_data: OverlayData,
    pub confidence_score: f32,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub frame_count: Option<u32>,
}

/// A successful analysis
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub feedback: Vec<FeedbackItem>,
    pub confidence_score: f32,
    pub overlay: OverlayData,
    pub processing_time: Option<f64>,
}

impl AnalysisOutcome {
    /// Confidence badge value, 0-100
    pub fn confidence_percent(&self) -> u8 {
        confidence_percent(self.confidence_score)
    }
}

/// Round a [0, 1] confidence to a whole percentage
pub fn confidence_percent(score: f32) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

impl TryFrom<AnalysisResponse> for AnalysisOutcome {
    type Error = AnalysisError;

    /// An empty feedback list is an error, not a success
    fn try_from(response: AnalysisResponse) -> Result<Self, Self::Error> {
        if response.feedback.is_empty() {
            return Err(AnalysisError::NoFeedback);
        }
        Ok(Self {
            feedback: response.feedback,
            confidence_score: response.confidence_score,
            overlay: response.overlay_data,
            processing_time: response.processing_time,
        })
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub ai_service: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// A style profile stored by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleUpload {
    pub style_id: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}
