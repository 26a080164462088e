// SPDX-License-Identifier: GPL-3.0-only

//! Camera lifecycle handlers
//!
//! Start, stop, switch, unexpected stream end and device topology. The
//! acquirer owns the stream; these handlers only keep a borrowed surface and
//! ask the acquirer to release.

use crate::analysis::OverlayData;
use crate::app::state::{CaptureSession, Message, SessionEvent, SessionState};
use crate::app::task::Task;
use crate::backends::camera::{
    CameraDevice, PermissionState, StreamAcquirer, SwitchFailure, VideoSurface,
};
use crate::errors::AcquisitionError;
use crate::pipelines::photo::FrameCapturer;
use tracing::{debug, info, warn};

/// Wait for the first decodable frame, releasing the stream if it never comes
async fn await_ready(
    acquirer: &StreamAcquirer,
    capturer: &FrameCapturer,
    surface: VideoSurface,
) -> Result<VideoSurface, AcquisitionError> {
    match capturer.wait_until_ready(&surface).await {
        Ok(()) => Ok(surface),
        Err(skipped) => {
            acquirer.stop_stream(surface.stream_id()).await;
            Err(AcquisitionError::Unknown(format!(
                "camera produced no frames ({})",
                skipped
            )))
        }
    }
}

impl CaptureSession {
    // =========================================================================
    // Camera Lifecycle Handlers
    // =========================================================================

    /// Start or restart the camera with the current facing preference
    pub(crate) fn handle_start(&mut self) -> Task {
        self.cancel_timers();
        self.camera_generation += 1;
        self.surface = None;
        self.paused = false;
        self.resume_state = None;
        self.state = SessionState::Initializing;

        let generation = self.camera_generation;
        let facing = self.facing;
        let acquirer = self.acquirer.clone();
        let capturer = self.capturer.clone();
        info!(%facing, generation, "Starting camera");

        Task::perform(async move {
            let result = match acquirer.start(facing).await {
                Ok(surface) => await_ready(&acquirer, &capturer, surface).await,
                Err(error) => Err(error),
            };
            Message::CameraStarted { generation, result }
        })
    }

    /// Release the camera, cancel timers and clear feedback
    pub(crate) fn handle_stop(&mut self) -> Task {
        info!(state = %self.state, "Stopping camera");
        self.cancel_timers();
        self.camera_generation += 1;
        self.surface = None;
        self.paused = false;
        self.resume_state = None;
        self.feedback.clear();
        self.confidence_score = 0.0;
        self.overlay = OverlayData::default();
        self.state = SessionState::Idle;

        let acquirer = self.acquirer.clone();
        Task::run(async move { acquirer.stop().await })
    }

    pub(crate) fn handle_shutdown(&mut self) -> Task {
        info!("Shutting down capture session");
        self.handle_stop()
    }

    pub(crate) fn handle_switch_camera(&mut self) -> Task {
        match self.state {
            SessionState::Idle | SessionState::Error { .. } => {
                // No stream yet: just flip the preference for the next start
                self.facing = self.facing.toggled();
                info!(facing = %self.facing, "Facing preference changed");
                Task::none()
            }
            SessionState::Initializing => {
                debug!("Switch requested while the camera is starting, ignoring");
                Task::none()
            }
            // Analyzing an uploaded photo with the camera off
            _ if self.surface.is_none() => {
                self.facing = self.facing.toggled();
                info!(state = %self.state, facing = %self.facing, "Facing preference changed");
                Task::none()
            }
            _ => {
                self.cancel_timers();
                self.camera_generation += 1;
                self.surface = None;
                self.state = SessionState::Initializing;

                let generation = self.camera_generation;
                let acquirer = self.acquirer.clone();
                let capturer = self.capturer.clone();
                info!(from = %self.facing, generation, "Switching camera");

                Task::perform(async move {
                    let result = match acquirer.switch_facing().await {
                        Ok(surface) => await_ready(&acquirer, &capturer, surface)
                            .await
                            .map_err(|error| SwitchFailure {
                                error,
                                restored: None,
                            }),
                        Err(SwitchFailure {
                            error,
                            restored: Some(surface),
                        }) => {
                            let restored = await_ready(&acquirer, &capturer, surface).await.ok();
                            Err(SwitchFailure { error, restored })
                        }
                        Err(failure) => Err(failure),
                    };
                    Message::CameraSwitched { generation, result }
                })
            }
        }
    }

    pub(crate) fn handle_camera_started(
        &mut self,
        generation: u64,
        result: Result<VideoSurface, AcquisitionError>,
    ) -> Task {
        if generation != self.camera_generation {
            debug!(
                generation,
                current = self.camera_generation,
                "Discarding stale camera start"
            );
            return match result {
                Ok(surface) => self.release_surface(&surface),
                Err(_) => Task::none(),
            };
        }

        match result {
            Ok(surface) => self.go_live(surface),
            Err(error) => {
                self.enter_error(&error);
                Task::none()
            }
        }
    }

    pub(crate) fn handle_camera_switched(
        &mut self,
        generation: u64,
        result: Result<VideoSurface, SwitchFailure>,
    ) -> Task {
        if generation != self.camera_generation {
            debug!(
                generation,
                current = self.camera_generation,
                "Discarding stale camera switch"
            );
            return match result {
                Ok(surface)
                | Err(SwitchFailure {
                    restored: Some(surface),
                    ..
                }) => self.release_surface(&surface),
                Err(_) => Task::none(),
            };
        }

        match result {
            Ok(surface) => {
                self.facing = self.facing.toggled();
                self.go_live(surface)
            }
            Err(SwitchFailure {
                error,
                restored: Some(surface),
            }) => {
                self.notice(format!("Could not switch camera: {}", error));
                self.go_live(surface)
            }
            Err(SwitchFailure {
                error,
                restored: None,
            }) => {
                self.enter_error(&error);
                Task::none()
            }
        }
    }

    /// The stream died under us (device unplugged, driver failure)
    pub(crate) fn handle_stream_ended(&mut self, generation: u64) -> Task {
        if generation != self.camera_generation || !self.state.has_camera() {
            return Task::none();
        }
        warn!(state = %self.state, "Camera stream ended unexpectedly");

        let task = match self.surface.take() {
            Some(surface) => self.release_surface(&surface),
            None => Task::none(),
        };
        self.enter_error(&AcquisitionError::Unknown("camera disconnected".to_string()));
        task
    }

    pub(crate) fn handle_refresh_devices(&mut self) -> Task {
        let prober = self.prober.clone();
        Task::perform(async move {
            let cameras = prober.refresh().await;
            let permission = prober.query_permission().await;
            Message::DevicesRefreshed {
                cameras,
                permission,
            }
        })
    }

    pub(crate) fn handle_devices_refreshed(
        &mut self,
        cameras: Vec<CameraDevice>,
        permission: PermissionState,
    ) -> Task {
        info!(count = cameras.len(), %permission, "Camera devices refreshed");
        self.permission = permission;
        self.handle_devices_changed(cameras)
    }

    pub(crate) fn handle_devices_changed(&mut self, cameras: Vec<CameraDevice>) -> Task {
        if cameras != self.cameras {
            debug!(count = cameras.len(), "Camera topology changed");
            self.cameras = cameras;
            self.emit(SessionEvent::DevicesChanged(self.cameras.clone()));
        }
        Task::none()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Adopt a ready surface and arm the stream watcher and periodic trigger
    fn go_live(&mut self, surface: VideoSurface) -> Task {
        let settings = surface.settings();
        info!(
            stream = surface.stream_id(),
            camera = %settings.label,
            width = settings.width,
            height = settings.height,
            "Camera live"
        );

        let generation = self.camera_generation;
        let watched = surface.clone();
        let (watch, handle) = Task::abortable(async move {
            watched.ended().await;
            Message::StreamEnded { generation }
        });
        self.stream_watch = Some(handle);
        self.surface = Some(surface);
        self.state = self.live_state();

        let periodic = self.schedule_periodic();
        Task::batch([watch, periodic])
    }

    /// Leave every camera state for Error, keeping the last feedback
    fn enter_error(&mut self, error: &AcquisitionError) {
        warn!(%error, remediation = %error.remediation(), "Camera unavailable");
        self.cancel_timers();
        self.camera_generation += 1;
        self.surface = None;
        self.paused = false;
        self.state = SessionState::from_acquisition_error(error);
    }

    /// Ask the acquirer to release one specific stream
    fn release_surface(&self, surface: &VideoSurface) -> Task {
        let acquirer = self.acquirer.clone();
        let stream_id = surface.stream_id().to_string();
        Task::run(async move {
            if acquirer.stop_stream(&stream_id).await {
                debug!(stream = %stream_id, "Released orphaned stream");
            }
        })
    }
}
