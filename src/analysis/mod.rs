// SPDX-License-Identifier: GPL-3.0-only

//! Analysis request pipeline
//!
//! ```text
//! CaptureFrame ─┐
//! mode/season ──┼─▶ build_request ─▶ AnalysisBackend::submit ─▶ AnalysisOutcome
//! style set ────┘
//! ```
//!
//! The pipeline does not care where the frame came from: a live capture and
//! an image file loaded for the upload fallback go through the same path.

pub mod client;
pub mod request;
pub mod response;
pub mod style;

pub use client::HttpAnalysisClient;
pub use request::{AnalysisMode, AnalysisRequest, CaptureMode, Season, StyleProfile, build_request};
pub use response::{AnalysisOutcome, FeedbackItem, HealthStatus, OverlayData, Priority, StyleUpload};
pub use style::{StyleReference, StyleReferenceSet};

use crate::errors::AnalysisResult;
use futures::future::BoxFuture;

/// Something that turns an analysis request into feedback
pub trait AnalysisBackend: Send + Sync {
    /// Dispatch one request
    ///
    /// A non-success status is `AnalysisError::HttpStatus`, a success with
    /// no feedback items is `AnalysisError::NoFeedback`.
    fn submit(&self, request: AnalysisRequest) -> BoxFuture<'_, AnalysisResult<AnalysisOutcome>>;
}
