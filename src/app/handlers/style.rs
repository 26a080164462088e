// SPDX-License-Identifier: GPL-3.0-only

//! Analysis context handlers
//!
//! Mode, season, style references and the still-image upload fallback.

use super::capture::run_analysis;
use crate::analysis::{CaptureMode, Season};
use crate::app::state::{AnalysisCompletion, CaptureSession, Message, SessionState};
use crate::app::task::Task;
use crate::backends::virtual_camera::load_still_image;
use crate::errors::SourceError;
use crate::pipelines::photo::CaptureFrame;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl CaptureSession {
    pub(crate) fn handle_set_mode(&mut self, mode: CaptureMode) -> Task {
        if mode == CaptureMode::Style && self.styles.is_empty() {
            self.notice("Style mode works best with at least one style reference");
        }
        info!(%mode, "Capture mode set");
        self.mode = mode;
        Task::none()
    }

    pub(crate) fn handle_set_season(&mut self, season: Season) -> Task {
        info!(%season, "Season set");
        self.season = season;
        self.season_fixed = true;
        Task::none()
    }

    /// Analyze a still image file through the same request path as a capture
    ///
    /// Accepted while no camera is running (Idle, Error) and while Live or
    /// Paused. From Idle and Error the session returns to where it was.
    pub(crate) fn handle_analyze_file(&mut self, path: PathBuf) -> Task {
        let resume = match self.state {
            SessionState::Idle | SessionState::Error { .. } => Some(self.state.clone()),
            SessionState::Live | SessionState::Paused => None,
            _ => {
                self.notice("Busy, try again when the current capture finishes");
                return Task::none();
            }
        };

        let seq = self.enter_analyzing(resume);
        let backend = Arc::clone(&self.backend);
        let (mode, season, styles) = (self.mode, self.season, self.styles.clone());
        info!(path = %path.display(), seq, %mode, %season, "Analyzing image file");

        Task::perform(async move {
            let completion = match load_still_image(&path).await {
                Ok(frame) => run_analysis(backend, frame, mode, season, styles).await,
                Err(error) => AnalysisCompletion::LoadFailed(error),
            };
            Message::AnalysisFinished { seq, completion }
        })
    }

    pub(crate) fn handle_add_style_reference(&mut self, path: PathBuf) -> Task {
        if self.styles.is_full() {
            self.notice(SourceError::StyleSetFull(self.styles.len()).to_string());
            return Task::none();
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!(path = %path.display(), "Loading style reference");

        Task::perform(async move {
            let result = load_still_image(&path).await;
            Message::StyleReferenceLoaded { name, result }
        })
    }

    pub(crate) fn handle_style_reference_loaded(
        &mut self,
        name: String,
        result: Result<CaptureFrame, SourceError>,
    ) -> Task {
        let added = result.and_then(|image| self.styles.add(&name, image));
        match added {
            Ok(id) => {
                info!(%name, %id, count = self.styles.len(), "Style reference added");
            }
            Err(error) => {
                warn!(%name, %error, "Style reference rejected");
                self.notice(format!("Could not add {}: {}", name, error));
            }
        }
        Task::none()
    }

    pub(crate) fn handle_remove_style_reference(&mut self, index: usize) -> Task {
        match self.styles.remove_at(index) {
            Some(reference) => {
                info!(name = %reference.name, count = self.styles.len(), "Style reference removed");
            }
            None => self.notice(format!("No style reference at position {}", index + 1)),
        }
        Task::none()
    }

    pub(crate) fn handle_clear_style_references(&mut self) -> Task {
        self.styles.clear();
        Task::none()
    }
}
