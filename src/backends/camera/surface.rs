// SPDX-License-Identifier: GPL-3.0-only

//! Renderable video surface fed by the active stream

use super::types::{CameraFrame, FrameReceiver, TrackSettings};
use super::MediaStream;
use crate::errors::CaptureSkipped;
use std::sync::Arc;

/// A surface showing the frames of one stream
///
/// Surfaces are cheap clones that only borrow the stream's frames. They never
/// stop or release the stream; that is the acquirer's job.
#[derive(Clone)]
pub struct VideoSurface {
    stream_id: String,
    settings: TrackSettings,
    frames: FrameReceiver,
    muted: bool,
    plays_inline: bool,
}

impl VideoSurface {
    /// Attach a stream to a new surface
    ///
    /// Surfaces are always muted and play inline so that autoplay is
    /// permitted on constrained platforms.
    pub(crate) fn attach(stream: &dyn MediaStream) -> Self {
        Self {
            stream_id: stream.id().to_string(),
            settings: stream.settings().clone(),
            frames: stream.frames(),
            muted: true,
            plays_inline: true,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn plays_inline(&self) -> bool {
        self.plays_inline
    }

    /// The latest frame, if it can be decoded
    pub fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        self.frames
            .borrow()
            .as_ref()
            .filter(|frame| frame.is_decodable())
            .cloned()
    }

    /// Native resolution of the latest frame, zero while nothing is decoded
    pub fn dimensions(&self) -> (u32, u32) {
        self.current_frame()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    /// Whether the surface has non-zero dimensions and a decodable frame
    pub fn is_ready(&self) -> bool {
        self.current_frame().is_some()
    }

    /// Whether the stream feeding this surface has ended
    pub fn has_ended(&self) -> bool {
        self.frames.has_changed().is_err()
    }

    /// Suspend until the surface has a decodable frame
    pub async fn ready(&self) -> Result<(), CaptureSkipped> {
        let mut frames = self.frames.clone();
        frames
            .wait_for(|frame| frame.as_ref().is_some_and(|f| f.is_decodable()))
            .await
            .map(|_| ())
            .map_err(|_| CaptureSkipped::StreamEnded)
    }

    /// Suspend until the stream feeding this surface ends
    pub async fn ended(&self) {
        let mut frames = self.frames.clone();
        while frames.changed().await.is_ok() {}
    }
}

impl std::fmt::Debug for VideoSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSurface")
            .field("stream_id", &self.stream_id)
            .field("settings", &self.settings)
            .field("ready", &self.is_ready())
            .finish()
    }
}
