// SPDX-License-Identifier: GPL-3.0-only

//! Stream acquirer
//!
//! Owns the single active camera stream. Acquisition walks an ordered list
//! of constraint variants (exact facing, then ideal facing) and the first
//! success wins. Any previous stream is released before a new one is
//! requested so the process never holds two hardware locks.

use super::surface::VideoSurface;
use super::types::{DimensionConstraint, Facing, StreamConstraints};
use super::{MediaDevices, MediaStream};
use crate::errors::{AcquisitionError, AcquisitionResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of a failed `switch_facing`
#[derive(Debug, Clone)]
pub struct SwitchFailure {
    /// Why the new facing could not be acquired
    pub error: AcquisitionError,
    /// Surface of the re-acquired previous facing, if that worked
    pub restored: Option<VideoSurface>,
}

struct AcquirerState {
    active: Option<Box<dyn MediaStream>>,
    surface: Option<VideoSurface>,
    facing: Facing,
}

impl AcquirerState {
    /// Stop the active stream on the blocking pool
    ///
    /// Platform streams may join a capture thread on stop.
    async fn release(&mut self) {
        self.surface = None;
        if let Some(stream) = self.active.take() {
            info!(stream = stream.id(), "Releasing camera stream");
            if let Err(e) = tokio::task::spawn_blocking(move || stream.stop()).await {
                warn!(error = %e, "Camera release task failed");
            }
        }
    }

    fn attach(&mut self, stream: Box<dyn MediaStream>) -> VideoSurface {
        let surface = VideoSurface::attach(stream.as_ref());
        self.active = Some(stream);
        self.surface = Some(surface.clone());
        surface
    }
}

/// Negotiates, holds and releases the active camera stream
///
/// Cheap to clone; clones share the same stream. Operations are serialized,
/// so a `stop` issued during a `start` takes effect after it.
#[derive(Clone)]
pub struct StreamAcquirer {
    devices: Arc<dyn MediaDevices>,
    width: DimensionConstraint,
    height: DimensionConstraint,
    state: Arc<Mutex<AcquirerState>>,
}

impl StreamAcquirer {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        width: DimensionConstraint,
        height: DimensionConstraint,
        facing: Facing,
    ) -> Self {
        Self {
            devices,
            width,
            height,
            state: Arc::new(Mutex::new(AcquirerState {
                active: None,
                surface: None,
                facing,
            })),
        }
    }

    /// Start a stream for `facing`, replacing any active stream
    pub async fn start(&self, facing: Facing) -> AcquisitionResult<VideoSurface> {
        let mut state = self.state.lock().await;
        state.release().await;
        state.facing = facing;

        let stream = self.acquire(facing).await?;
        Ok(state.attach(stream))
    }

    /// Release the active stream, if any
    pub async fn stop(&self) {
        self.state.lock().await.release().await;
    }

    /// Release the active stream only if it is the one identified by `stream_id`
    ///
    /// Returns whether a stream was released.
    pub async fn stop_stream(&self, stream_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let matches = state
            .active
            .as_ref()
            .is_some_and(|stream| stream.id() == stream_id);
        if matches {
            state.release().await;
        }
        matches
    }

    /// Toggle the facing preference and restart
    ///
    /// When the new facing cannot be acquired, the previous facing is
    /// re-acquired and the preference stays unchanged.
    pub async fn switch_facing(&self) -> Result<VideoSurface, SwitchFailure> {
        let mut state = self.state.lock().await;
        let previous = state.facing;
        let next = previous.toggled();
        info!(from = %previous, to = %next, "Switching camera facing");

        state.release().await;

        match self.acquire(next).await {
            Ok(stream) => {
                state.facing = next;
                Ok(state.attach(stream))
            }
            Err(error) => {
                warn!(facing = %next, %error, "Switch failed, restoring previous camera");
                let restored = match self.acquire(previous).await {
                    Ok(stream) => Some(state.attach(stream)),
                    Err(restore_error) => {
                        warn!(facing = %previous, error = %restore_error, "Could not restore previous camera");
                        None
                    }
                };
                Err(SwitchFailure { error, restored })
            }
        }
    }

    /// Current facing preference
    pub async fn facing(&self) -> Facing {
        self.state.lock().await.facing
    }

    /// Surface of the active stream
    pub async fn surface(&self) -> Option<VideoSurface> {
        self.state.lock().await.surface.clone()
    }

    /// Whether a stream is currently held
    pub async fn is_active(&self) -> bool {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .is_some_and(|stream| stream.is_active())
    }

    async fn acquire(&self, facing: Facing) -> AcquisitionResult<Box<dyn MediaStream>> {
        if !self.devices.is_supported() {
            return Err(AcquisitionError::NotSupported);
        }

        let mut last_error = AcquisitionError::DeviceNotFound;
        for constraints in StreamConstraints::fallback_chain(facing, self.width, self.height) {
            debug!(%constraints, "Requesting camera stream");
            match self.devices.get_user_media(constraints).await {
                Ok(stream) => {
                    let settings = stream.settings();
                    info!(
                        stream = stream.id(),
                        device = %settings.label,
                        width = settings.width,
                        height = settings.height,
                        %constraints,
                        "Camera stream acquired"
                    );
                    return Ok(stream);
                }
                Err(error) => {
                    debug!(%constraints, %error, "Constraint variant failed");
                    let relaxing_helps = error.is_retryable_with_relaxed_constraints();
                    last_error = error;
                    if !relaxing_helps {
                        break;
                    }
                }
            }
        }

        warn!(%facing, error = %last_error, "Camera acquisition failed");
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{
        CameraDevice, FacingConstraint, FrameReceiver, PermissionState, TrackSettings,
    };
    use crate::backends::virtual_camera::VirtualDevices;
    use crate::errors::AcquisitionError;
    use futures::future::BoxFuture;
    use futures::stream::BoxStream;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn acquirer(devices: &VirtualDevices) -> StreamAcquirer {
        StreamAcquirer::new(
            Arc::new(devices.clone()),
            DimensionConstraint { ideal: 1280, min: 640 },
            DimensionConstraint { ideal: 720, min: 480 },
            Facing::User,
        )
    }

    #[tokio::test]
    async fn test_exact_then_ideal_fallback() {
        let devices = VirtualDevices::front_only();
        let acquirer = acquirer(&devices);

        let surface = acquirer.start(Facing::Environment).await;
        assert!(surface.is_ok());

        let requests = devices.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].facing, FacingConstraint::Exact(Facing::Environment));
        assert_eq!(requests[1].facing, FacingConstraint::Ideal(Facing::Environment));
    }

    #[tokio::test]
    async fn test_permission_denied_is_not_retried() {
        let devices = VirtualDevices::front_only().with_permission(crate::backends::camera::PermissionState::Denied);
        let acquirer = acquirer(&devices);

        let result = acquirer.start(Facing::User).await;
        assert_eq!(result.err(), Some(AcquisitionError::PermissionDenied));
        assert_eq!(devices.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_not_supported() {
        let devices = VirtualDevices::unsupported();
        let acquirer = acquirer(&devices);
        let result = acquirer.start(Facing::User).await;
        assert_eq!(result.err(), Some(AcquisitionError::NotSupported));
    }

    #[tokio::test]
    async fn test_restart_never_holds_two_streams() {
        let devices = VirtualDevices::front_and_rear();
        let acquirer = acquirer(&devices);

        for facing in [Facing::User, Facing::Environment, Facing::User] {
            acquirer.start(facing).await.ok();
            assert_eq!(devices.active_streams(), 1);
        }
        assert_eq!(devices.max_concurrent_streams(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let devices = VirtualDevices::front_only();
        let acquirer = acquirer(&devices);

        acquirer.stop().await;
        acquirer.start(Facing::User).await.ok();
        acquirer.stop().await;
        acquirer.stop().await;
        assert_eq!(devices.active_streams(), 0);
        assert!(!acquirer.is_active().await);
    }

    #[tokio::test]
    async fn test_stop_stream_ignores_other_ids() {
        let devices = VirtualDevices::front_only();
        let acquirer = acquirer(&devices);
        acquirer.start(Facing::User).await.ok();

        assert!(!acquirer.stop_stream("not-this-one").await);
        assert_eq!(devices.active_streams(), 1);
    }

    #[tokio::test]
    async fn test_switch_toggles_facing() {
        let devices = VirtualDevices::front_and_rear();
        let acquirer = acquirer(&devices);
        acquirer.start(Facing::User).await.ok();

        let surface = acquirer.switch_facing().await.ok();
        assert_eq!(
            surface.and_then(|s| s.settings().facing),
            Some(Facing::Environment)
        );
        assert_eq!(acquirer.facing().await, Facing::Environment);
    }

    #[tokio::test]
    async fn test_switch_failure_restores_previous() {
        let devices = VirtualDevices::front_and_rear();
        devices.set_busy("virtual-1", true);
        let acquirer = acquirer(&devices);
        acquirer.start(Facing::User).await.ok();

        let failure = acquirer.switch_facing().await.err();
        let restored = failure.as_ref().and_then(|f| f.restored.clone());
        assert!(restored.is_some());
        assert_eq!(
            restored.and_then(|s| s.settings().facing),
            Some(Facing::User)
        );
        assert_eq!(acquirer.facing().await, Facing::User);
        assert_eq!(devices.active_streams(), 1);
    }

    /// Stream whose stop blocks the calling thread for a while
    struct SlowStream {
        settings: TrackSettings,
        frames: FrameReceiver,
        active: AtomicBool,
    }

    impl MediaStream for SlowStream {
        fn id(&self) -> &str {
            "slow"
        }

        fn settings(&self) -> &TrackSettings {
            &self.settings
        }

        fn frames(&self) -> FrameReceiver {
            self.frames.clone()
        }

        fn stop(&self) {
            if self.active.swap(false, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    struct SlowDevices;

    impl MediaDevices for SlowDevices {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn is_supported(&self) -> bool {
            true
        }

        fn enumerate_devices(&self) -> BoxFuture<'_, Option<Vec<CameraDevice>>> {
            Box::pin(async { Some(Vec::new()) })
        }

        fn query_permission(&self) -> BoxFuture<'_, Option<PermissionState>> {
            Box::pin(async { Some(PermissionState::Granted) })
        }

        fn get_user_media(
            &self,
            _constraints: StreamConstraints,
        ) -> BoxFuture<'_, AcquisitionResult<Box<dyn MediaStream>>> {
            Box::pin(async {
                let (_tx, frames) = tokio::sync::watch::channel(None);
                let stream: Box<dyn MediaStream> = Box::new(SlowStream {
                    settings: TrackSettings {
                        device_id: "slow".to_string(),
                        label: "Slow camera".to_string(),
                        facing: Some(Facing::User),
                        width: 640,
                        height: 480,
                    },
                    frames,
                    active: AtomicBool::new(true),
                });
                Ok(stream)
            })
        }

        fn device_changes(&self) -> Option<BoxStream<'static, ()>> {
            None
        }
    }

    #[tokio::test]
    async fn test_release_keeps_executor_running() {
        let acquirer = StreamAcquirer::new(
            Arc::new(SlowDevices),
            DimensionConstraint { ideal: 640, min: 320 },
            DimensionConstraint { ideal: 480, min: 240 },
            Facing::User,
        );
        assert!(acquirer.start(Facing::User).await.is_ok());

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        // Single-threaded runtime: the ticker only runs if stop yields
        acquirer.stop().await;
        ticker.abort();

        assert!(ticks.load(Ordering::SeqCst) >= 3);
        assert!(!acquirer.is_active().await);
    }

    #[tokio::test]
    async fn test_surface_is_muted_inline() {
        let devices = VirtualDevices::front_only();
        let acquirer = acquirer(&devices);
        let surface = acquirer.start(Facing::User).await.ok();
        assert!(surface.as_ref().is_some_and(|s| s.is_muted() && s.plays_inline()));
    }
}
