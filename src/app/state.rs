// SPDX-License-Identifier: GPL-3.0-only

//! Session state, messages and the session model

use crate::analysis::{
    AnalysisBackend, AnalysisOutcome, CaptureMode, FeedbackItem, OverlayData, Season,
    StyleReferenceSet,
};
use crate::backends::camera::{
    CameraDevice, DeviceProber, Facing, PermissionState, StreamAcquirer, SwitchFailure,
    TrackSettings, VideoSurface,
};
use crate::config::Schedule;
use crate::errors::{AcquisitionError, AnalysisError, CaptureSkipped, Remediation, SourceError};
use crate::pipelines::photo::{CaptureFrame, FrameCapturer};
use futures::future::AbortHandle;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle of a capture session
///
/// Exactly one state is active at a time. `Paused` is reported while the
/// paused flag is set and nothing else is going on; during a countdown or an
/// analysis the flag is kept and honoured once the session settles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Acquiring a camera and waiting for its first frame
    Initializing,
    Live,
    /// Manual capture countdown, `remaining` whole seconds left
    CountingDown { remaining: u32 },
    /// One capture/analysis in flight
    Analyzing,
    Paused,
    /// Camera failure retained for display until the user retries
    Error {
        message: String,
        remediation: Remediation,
    },
}

impl SessionState {
    pub fn from_acquisition_error(error: &AcquisitionError) -> Self {
        SessionState::Error {
            message: error.to_string(),
            remediation: error.remediation(),
        }
    }

    /// A camera stream is held in this state
    pub fn has_camera(&self) -> bool {
        matches!(
            self,
            SessionState::Live
                | SessionState::CountingDown { .. }
                | SessionState::Analyzing
                | SessionState::Paused
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Live => write!(f, "live"),
            SessionState::CountingDown { remaining } => write!(f, "counting down ({})", remaining),
            SessionState::Analyzing => write!(f, "analyzing"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Error {
                message,
                remediation,
            } => write!(f, "error: {} ({})", message, remediation),
        }
    }
}

/// How an analysis attempt ended
#[derive(Debug, Clone)]
pub enum AnalysisCompletion {
    /// The capturer had no frame to give; nothing was sent
    Skipped(CaptureSkipped),
    /// The still image for the upload fallback could not be loaded
    LoadFailed(SourceError),
    Failed(AnalysisError),
    Done(AnalysisOutcome),
}

/// Messages handled by [`CaptureSession::update`]
#[derive(Debug, Clone)]
pub enum Message {
    // ===== User intents =====
    /// Start (or restart) the camera
    Start,
    /// Release the camera and clear feedback
    Stop,
    /// Start the countdown, or cancel a running one
    TakePhoto,
    TogglePause,
    SwitchCamera,
    SetMode(CaptureMode),
    SetSeason(Season),
    /// Analyze a still image file instead of the live camera
    AnalyzeFile(PathBuf),
    AddStyleReference(PathBuf),
    RemoveStyleReference(usize),
    ClearStyleReferences,
    RefreshDevices,
    /// Tear the session down; the runtime exits afterwards
    Shutdown,

    // ===== Internal =====
    /// Result of `start`, including the readiness wait
    CameraStarted {
        generation: u64,
        result: Result<VideoSurface, AcquisitionError>,
    },
    /// Result of `switch_facing`, including the readiness wait
    CameraSwitched {
        generation: u64,
        result: Result<VideoSurface, SwitchFailure>,
    },
    /// The live stream stopped delivering frames
    StreamEnded { generation: u64 },
    CountdownTick,
    /// Settle delay after the countdown elapsed
    Shutter,
    PeriodicTick { generation: u64 },
    AnalysisFinished {
        seq: u64,
        completion: AnalysisCompletion,
    },
    StyleReferenceLoaded {
        name: String,
        result: Result<CaptureFrame, SourceError>,
    },
    DevicesRefreshed {
        cameras: Vec<CameraDevice>,
        permission: PermissionState,
    },
    DevicesChanged(Vec<CameraDevice>),
}

/// Something the presentation layer should show once
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    Countdown(u32),
    /// A completed analysis replaced the displayed feedback
    Feedback {
        items: Vec<FeedbackItem>,
        confidence_percent: u8,
    },
    /// Transient, non-fatal problem
    Notice(String),
    DevicesChanged(Vec<CameraDevice>),
}

/// Everything a view needs to draw the session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub paused: bool,
    pub facing: Facing,
    pub mode: CaptureMode,
    pub season: Option<Season>,
    pub feedback: Vec<FeedbackItem>,
    pub confidence_score: f32,
    pub confidence_percent: u8,
    pub overlay: OverlayData,
    pub style_references: usize,
    pub cameras: Vec<CameraDevice>,
    pub permission: PermissionState,
    pub track: Option<TrackSettings>,
}

/// Camera and analysis collaborators of a session
pub struct SessionParts {
    pub prober: DeviceProber,
    pub acquirer: StreamAcquirer,
    pub capturer: FrameCapturer,
    pub backend: Arc<dyn AnalysisBackend>,
}

/// The capture session model
///
/// All fields are mutated through [`CaptureSession::update`] only.
pub struct CaptureSession {
    pub(crate) prober: DeviceProber,
    pub(crate) acquirer: StreamAcquirer,
    pub(crate) capturer: FrameCapturer,
    pub(crate) backend: Arc<dyn AnalysisBackend>,
    pub(crate) schedule: Schedule,

    pub(crate) state: SessionState,
    pub(crate) paused: bool,
    /// Where an upload started from Idle or Error returns to
    pub(crate) resume_state: Option<SessionState>,
    pub(crate) facing: Facing,
    pub(crate) mode: CaptureMode,
    pub(crate) season: Season,
    pub(crate) season_fixed: bool,
    pub(crate) styles: StyleReferenceSet,

    pub(crate) surface: Option<VideoSurface>,
    pub(crate) feedback: Vec<FeedbackItem>,
    pub(crate) confidence_score: f32,
    pub(crate) overlay: OverlayData,
    pub(crate) cameras: Vec<CameraDevice>,
    pub(crate) permission: PermissionState,

    /// Bumped on every acquisition, stop and teardown
    pub(crate) camera_generation: u64,
    /// Bumped for every analysis dispatched
    pub(crate) analysis_seq: u64,
    /// Captures in a row whose frame could not be encoded
    pub(crate) encode_failures: u32,

    pub(crate) countdown_timer: Option<AbortHandle>,
    pub(crate) periodic_timer: Option<AbortHandle>,
    pub(crate) stream_watch: Option<AbortHandle>,

    pub(crate) events: mpsc::UnboundedSender<SessionEvent>,
}

impl CaptureSession {
    pub fn new(
        parts: SessionParts,
        schedule: Schedule,
        facing: Facing,
        mode: CaptureMode,
        season: Option<Season>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            prober: parts.prober,
            acquirer: parts.acquirer,
            capturer: parts.capturer,
            backend: parts.backend,
            schedule,
            state: SessionState::Idle,
            paused: false,
            resume_state: None,
            facing,
            mode,
            season: season.unwrap_or_else(Season::current),
            season_fixed: season.is_some(),
            styles: StyleReferenceSet::default(),
            surface: None,
            feedback: Vec::new(),
            confidence_score: 0.0,
            overlay: OverlayData::default(),
            cameras: Vec::new(),
            permission: PermissionState::Unknown,
            camera_generation: 0,
            analysis_seq: 0,
            encode_failures: 0,
            countdown_timer: None,
            periodic_timer: None,
            stream_watch: None,
            events,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn feedback(&self) -> &[FeedbackItem] {
        &self.feedback
    }

    pub fn confidence_score(&self) -> f32 {
        self.confidence_score
    }

    pub fn styles(&self) -> &StyleReferenceSet {
        &self.styles
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            paused: self.paused,
            facing: self.facing,
            mode: self.mode,
            season: Some(self.season),
            feedback: self.feedback.clone(),
            confidence_score: self.confidence_score,
            confidence_percent: crate::analysis::response::confidence_percent(
                self.confidence_score,
            ),
            overlay: self.overlay.clone(),
            style_references: self.styles.len(),
            cameras: self.cameras.clone(),
            permission: self.permission,
            track: self.surface.as_ref().map(|s| s.settings().clone()),
        }
    }

    /// Resting state while the camera is running
    pub(crate) fn live_state(&self) -> SessionState {
        if self.paused {
            SessionState::Paused
        } else {
            SessionState::Live
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn notice(&self, message: impl Into<String>) {
        self.emit(SessionEvent::Notice(message.into()));
    }

    pub(crate) fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown_timer.take() {
            handle.abort();
        }
    }

    /// Abort every timer and watcher tied to the current camera
    pub(crate) fn cancel_timers(&mut self) {
        self.cancel_countdown();
        if let Some(handle) = self.periodic_timer.take() {
            handle.abort();
        }
        if let Some(handle) = self.stream_watch.take() {
            handle.abort();
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::analysis::AnalysisRequest;
    use crate::backends::virtual_camera::VirtualDevices;
    use crate::config::Config;
    use crate::errors::AnalysisResult;
    use crate::pipelines::photo::PhotoEncoder;
    use futures::FutureExt;
    use futures::future::BoxFuture;

    struct Offline;

    impl AnalysisBackend for Offline {
        fn submit(&self, _request: AnalysisRequest) -> BoxFuture<'_, AnalysisResult<AnalysisOutcome>> {
            async { Err(AnalysisError::NetworkFailure("offline".to_string())) }.boxed()
        }
    }

    /// A session over a virtual front camera with an offline backend
    pub(crate) fn session() -> (CaptureSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let config = Config::default();
        let devices = Arc::new(VirtualDevices::front_only());
        let parts = SessionParts {
            prober: DeviceProber::new(devices.clone()),
            acquirer: StreamAcquirer::new(
                devices,
                config.width_constraint(),
                config.height_constraint(),
                Facing::User,
            ),
            capturer: FrameCapturer::new(PhotoEncoder::default(), config.schedule().ready_timeout),
            backend: Arc::new(Offline),
        };
        let (events, receiver) = mpsc::unbounded_channel();
        let session = CaptureSession::new(
            parts,
            config.schedule(),
            Facing::User,
            CaptureMode::Outfit,
            Some(Season::Summer),
            events,
        );
        (session, receiver)
    }
}
