// SPDX-License-Identifier: MPL-2.0

//! Still capture from a video surface
//!
//! The capturer only borrows the surface. It reads the latest decodable frame
//! at the surface's native resolution and encodes it; the stream keeps
//! running untouched.

use super::{CaptureFrame, PhotoEncoder};
use crate::backends::camera::VideoSurface;
use crate::errors::CaptureSkipped;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Clears the pending flag when a capture finishes or is dropped mid-way
struct PendingGuard(Arc<AtomicBool>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Produces encoded stills from a surface, one at a time
#[derive(Clone)]
pub struct FrameCapturer {
    encoder: PhotoEncoder,
    ready_timeout: Duration,
    pending: Arc<AtomicBool>,
}

impl FrameCapturer {
    pub fn new(encoder: PhotoEncoder, ready_timeout: Duration) -> Self {
        Self {
            encoder,
            ready_timeout,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Suspend until the surface reports a decodable frame
    ///
    /// Gives up with `NotReady` after the configured timeout, or with
    /// `StreamEnded` if the stream stops first.
    pub async fn wait_until_ready(&self, surface: &VideoSurface) -> Result<(), CaptureSkipped> {
        match tokio::time::timeout(self.ready_timeout, surface.ready()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.ready_timeout.as_millis() as u64,
                    "Surface did not become ready"
                );
                Err(CaptureSkipped::NotReady)
            }
        }
    }

    /// Capture the current frame, `None` meaning "skip this tick"
    pub async fn capture(&self, surface: &VideoSurface) -> Option<CaptureFrame> {
        match self.try_capture(surface).await {
            Ok(frame) => Some(frame),
            Err(reason) => {
                debug!(%reason, "Capture skipped");
                None
            }
        }
    }

    /// Capture the current frame, reporting why nothing was captured
    pub async fn try_capture(&self, surface: &VideoSurface) -> Result<CaptureFrame, CaptureSkipped> {
        if surface.has_ended() {
            return Err(CaptureSkipped::StreamEnded);
        }
        let frame = surface.current_frame().ok_or(CaptureSkipped::NotReady)?;

        if self.pending.swap(true, Ordering::SeqCst) {
            return Err(CaptureSkipped::Busy);
        }
        let _pending = PendingGuard(Arc::clone(&self.pending));

        let (width, height, format) = (frame.width, frame.height, frame.format);
        self.encoder.encode(frame).await.map_err(|e| {
            warn!(error = %e, width, height, ?format, "Frame could not be encoded");
            CaptureSkipped::EncodeFailed
        })
    }

    /// Whether a capture is being encoded right now
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{
        CameraFrame, DimensionConstraint, Facing, PixelFormat, StreamAcquirer,
    };
    use std::time::Instant;
    use crate::backends::virtual_camera::VirtualDevices;

    async fn live_surface(devices: &VirtualDevices) -> (StreamAcquirer, VideoSurface) {
        let acquirer = StreamAcquirer::new(
            Arc::new(devices.clone()),
            DimensionConstraint { ideal: 1280, min: 640 },
            DimensionConstraint { ideal: 720, min: 480 },
            Facing::User,
        );
        match acquirer.start(Facing::User).await {
            Ok(surface) => (acquirer, surface),
            Err(e) => panic!("acquisition failed: {}", e),
        }
    }

    fn capturer() -> FrameCapturer {
        FrameCapturer::new(PhotoEncoder::default(), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_before_ready_is_skipped() {
        let devices = VirtualDevices::front_only().with_warmup(Duration::from_secs(1));
        let (_acquirer, surface) = live_surface(&devices).await;

        assert!(!surface.is_ready());
        assert_eq!(surface.dimensions(), (0, 0));
        let capturer = capturer();
        assert_eq!(
            capturer.try_capture(&surface).await.err(),
            Some(CaptureSkipped::NotReady)
        );
        assert!(capturer.capture(&surface).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_after_ready_uses_native_size() {
        let devices = VirtualDevices::front_only();
        let (_acquirer, surface) = live_surface(&devices).await;
        let capturer = capturer();

        assert_eq!(capturer.wait_until_ready(&surface).await, Ok(()));
        let frame = capturer.capture(&surface).await;
        let Some(frame) = frame else {
            panic!("expected a frame");
        };
        assert_eq!((frame.width(), frame.height()), surface.dimensions());
        assert!(!capturer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_times_out() {
        let devices = VirtualDevices::front_only().with_warmup(Duration::from_secs(60));
        let (_acquirer, surface) = live_surface(&devices).await;
        assert_eq!(
            capturer().wait_until_ready(&surface).await,
            Err(CaptureSkipped::NotReady)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_stream_reports_ended() {
        let devices = VirtualDevices::front_only();
        let (acquirer, surface) = live_surface(&devices).await;
        let capturer = capturer();
        capturer.wait_until_ready(&surface).await.ok();

        acquirer.stop().await;
        surface.ended().await;
        assert_eq!(
            capturer.try_capture(&surface).await.err(),
            Some(CaptureSkipped::StreamEnded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_frame_reports_encode_failure() {
        let corrupt = CameraFrame {
            width: 640,
            height: 480,
            data: Arc::from(vec![0x42u8; 2048]),
            format: PixelFormat::MJPEG,
            stride: 0,
            captured_at: Instant::now(),
        };
        let devices = VirtualDevices::from_image("Corrupt", Some(Facing::User), corrupt);
        let (_acquirer, surface) = live_surface(&devices).await;
        let capturer = capturer();

        assert_eq!(capturer.wait_until_ready(&surface).await, Ok(()));
        assert_eq!(
            capturer.try_capture(&surface).await.err(),
            Some(CaptureSkipped::EncodeFailed)
        );
        assert!(!capturer.is_pending());
    }

    #[tokio::test]
    async fn test_busy_while_pending() {
        let devices = VirtualDevices::front_only().with_warmup(Duration::ZERO);
        let (_acquirer, surface) = live_surface(&devices).await;
        let capturer = capturer();
        capturer.wait_until_ready(&surface).await.ok();

        capturer.pending.store(true, Ordering::SeqCst);
        assert_eq!(
            capturer.try_capture(&surface).await.err(),
            Some(CaptureSkipped::Busy)
        );
    }
}
