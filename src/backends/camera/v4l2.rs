// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera platform
//!
//! Enumerates `/dev/video*` capture nodes and streams frames from them with
//! memory-mapped buffers. Each open stream runs on its own [`FrameLoop`]
//! thread; frames are published unconverted (MJPEG, YUYV or RGB24) and only
//! decoded when a still is captured.

use super::frame_loop::{FrameLoop, LoopAction};
use super::types::{
    CameraDevice, CameraFrame, DeviceKind, Facing, FrameReceiver, FrameSender, PermissionState,
    PixelFormat, StreamConstraints, TrackSettings,
};
use super::{MediaDevices, MediaStream};
use crate::constants::timing;
use crate::errors::{AcquisitionError, AcquisitionResult};
use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

const SYSFS_VIDEO4LINUX: &str = "/sys/class/video4linux";
const ENODEV: i32 = 19;
const EBUSY: i32 = 16;

/// Consecutive dequeue failures after which a stream is considered dead
const MAX_CONSECUTIVE_ERRORS: u32 = 30;

/// Capture formats in order of preference
const PREFERRED_FOURCCS: [(&[u8; 4], PixelFormat); 3] = [
    (b"MJPG", PixelFormat::MJPEG),
    (b"YUYV", PixelFormat::YUYV),
    (b"RGB3", PixelFormat::RGB24),
];

/// Cameras exposed by the kernel's Video4Linux2 API
#[derive(Debug, Clone, Default)]
pub struct V4l2Devices;

impl V4l2Devices {
    pub fn new() -> Self {
        Self
    }
}

impl MediaDevices for V4l2Devices {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn is_supported(&self) -> bool {
        Path::new(SYSFS_VIDEO4LINUX).exists()
    }

    fn enumerate_devices(&self) -> BoxFuture<'_, Option<Vec<CameraDevice>>> {
        async {
            tokio::task::spawn_blocking(enumerate_capture_devices)
                .await
                .map_err(|e| warn!(error = %e, "Device enumeration task failed"))
                .ok()
        }
        .boxed()
    }

    fn query_permission(&self) -> BoxFuture<'_, Option<PermissionState>> {
        async {
            tokio::task::spawn_blocking(probe_permission)
                .await
                .ok()
                .flatten()
        }
        .boxed()
    }

    fn get_user_media(
        &self,
        constraints: StreamConstraints,
    ) -> BoxFuture<'_, AcquisitionResult<Box<dyn MediaStream>>> {
        async move {
            let devices = tokio::task::spawn_blocking(enumerate_capture_devices)
                .await
                .map_err(|e| AcquisitionError::Unknown(e.to_string()))?;

            let device = constraints.select_device(&devices)?.clone();
            let (width, height) = constraints.pick_resolution(&device.resolutions)?;

            let stream = V4l2Stream::open(device, width, height, constraints).await?;
            Ok(Box::new(stream) as Box<dyn MediaStream>)
        }
        .boxed()
    }

    fn device_changes(&self) -> Option<BoxStream<'static, ()>> {
        Some(
            async_stream::stream! {
                let mut known = video_nodes();
                let mut ticker = tokio::time::interval(timing::DEVICE_POLL_INTERVAL);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let current = video_nodes();
                    if current != known {
                        debug!(before = known.len(), after = current.len(), "V4L2 nodes changed");
                        known = current;
                        yield ();
                    }
                }
            }
            .boxed(),
        )
    }
}

/// Names of `/dev/video*` nodes
fn video_nodes() -> BTreeSet<String> {
    std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name.starts_with("video"))
        .collect()
}

fn enumerate_capture_devices() -> Vec<CameraDevice> {
    let mut cameras = Vec::new();

    for name in video_nodes() {
        let path = PathBuf::from("/dev").join(&name);
        let Ok(dev) = Device::with_path(&path) else {
            debug!(path = %path.display(), "Cannot open node, skipping");
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        // Metadata and output nodes share the video* namespace
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            continue;
        }

        let resolutions = capture_sizes(&dev);
        if resolutions.is_empty() {
            continue;
        }

        let device = CameraDevice {
            id: path.to_string_lossy().to_string(),
            label: caps.card.clone(),
            kind: DeviceKind::VideoInput,
            facing: Facing::from_hint(&caps.card),
            resolutions,
        };
        debug!(id = %device.id, label = %device.label, facing = ?device.facing, "Found V4L2 camera");
        cameras.push(device);
    }

    cameras
}

/// Discrete frame sizes of the preferred formats, largest first
fn capture_sizes(dev: &Device) -> Vec<(u32, u32)> {
    let mut sizes = BTreeSet::new();
    let Ok(formats) = dev.enum_formats() else {
        return Vec::new();
    };

    for desc in formats {
        if !PREFERRED_FOURCCS
            .iter()
            .any(|(code, _)| FourCC::new(code) == desc.fourcc)
        {
            continue;
        }
        let Ok(frame_sizes) = dev.enum_framesizes(desc.fourcc) else {
            continue;
        };
        for size in frame_sizes {
            match size.size {
                v4l::framesize::FrameSizeEnum::Discrete(d) => {
                    sizes.insert((d.width, d.height));
                }
                v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                    sizes.insert((step.max_width, step.max_height));
                }
            }
        }
    }

    let mut sizes: Vec<_> = sizes.into_iter().collect();
    sizes.sort_by_key(|&(w, h)| std::cmp::Reverse(w * h));
    sizes
}

fn probe_permission() -> Option<PermissionState> {
    let node = video_nodes().into_iter().next()?;
    let path = PathBuf::from("/dev").join(node);
    match std::fs::OpenOptions::new().read(true).write(true).open(&path) {
        Ok(_) => Some(PermissionState::Granted),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Some(PermissionState::Denied),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Permission check inconclusive");
            Some(PermissionState::Unknown)
        }
    }
}

fn map_io_error(context: &str, err: std::io::Error) -> AcquisitionError {
    match (err.kind(), err.raw_os_error()) {
        (std::io::ErrorKind::PermissionDenied, _) => AcquisitionError::PermissionDenied,
        (std::io::ErrorKind::NotFound, _) | (_, Some(ENODEV)) => AcquisitionError::DeviceNotFound,
        (_, Some(EBUSY)) => AcquisitionError::Unknown(format!("{}: device is busy", context)),
        _ => AcquisitionError::Unknown(format!("{}: {}", context, err)),
    }
}

/// State owned by the capture thread
struct CaptureState {
    stream: Stream<'static>,
    sender: FrameSender,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    consecutive_errors: u32,
}

impl CaptureState {
    fn open(path: &str, width: u32, height: u32, sender: FrameSender) -> AcquisitionResult<Self> {
        let dev = Device::with_path(path).map_err(|e| map_io_error("open", e))?;

        let mut negotiated = None;
        for (code, format) in PREFERRED_FOURCCS {
            let requested = Format::new(width, height, FourCC::new(code));
            match dev.set_format(&requested) {
                Ok(actual) if actual.fourcc == FourCC::new(code) => {
                    negotiated = Some((actual, format));
                    break;
                }
                Ok(actual) => {
                    debug!(wanted = ?FourCC::new(code), got = ?actual.fourcc, "Format not accepted");
                }
                Err(e) => return Err(map_io_error("set format", e)),
            }
        }
        let (actual, format) = negotiated.ok_or(AcquisitionError::ConstraintsNotSatisfiable)?;

        info!(
            path,
            width = actual.width,
            height = actual.height,
            fourcc = ?actual.fourcc,
            "V4L2 format configured"
        );

        let mut stream = Stream::with_buffers(&dev, Type::VideoCapture, 4)
            .map_err(|e| map_io_error("create buffers", e))?;
        stream.set_timeout(timing::DEQUEUE_TIMEOUT);

        Ok(Self {
            stream,
            sender,
            width: actual.width,
            height: actual.height,
            stride: actual.stride,
            format,
            consecutive_errors: 0,
        })
    }

    fn step(&mut self) -> LoopAction {
        match self.stream.next() {
            Ok((buf, meta)) => {
                self.consecutive_errors = 0;
                let used = match meta.bytesused as usize {
                    0 => buf.len(),
                    n => n.min(buf.len()),
                };
                let frame = CameraFrame {
                    width: self.width,
                    height: self.height,
                    data: Arc::from(&buf[..used]),
                    format: self.format,
                    stride: if self.format == PixelFormat::MJPEG { 0 } else { self.stride },
                    captured_at: Instant::now(),
                };
                self.sender.send_replace(Some(Arc::new(frame)));
                LoopAction::Continue
            }
            Err(e) => match DequeueFailure::classify(&e) {
                // Stalled camera; give the loop a chance to see its stop flag
                DequeueFailure::TimedOut => {
                    debug!("No frame within dequeue timeout");
                    LoopAction::Continue
                }
                DequeueFailure::Disconnected => {
                    warn!("Camera disconnected");
                    LoopAction::Stop
                }
                DequeueFailure::Other => count_failure(&mut self.consecutive_errors, &e),
            },
        }
    }
}

fn count_failure(consecutive: &mut u32, e: &std::io::Error) -> LoopAction {
    *consecutive += 1;
    warn!(error = %e, count = *consecutive, "Failed to dequeue frame");
    if *consecutive >= MAX_CONSECUTIVE_ERRORS {
        LoopAction::Stop
    } else {
        std::thread::sleep(std::time::Duration::from_millis(10));
        LoopAction::Continue
    }
}

/// How a failed buffer dequeue is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DequeueFailure {
    TimedOut,
    Disconnected,
    Other,
}

impl DequeueFailure {
    fn classify(e: &std::io::Error) -> Self {
        if e.raw_os_error() == Some(ENODEV) {
            Self::Disconnected
        } else if matches!(
            e.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) {
            Self::TimedOut
        } else {
            Self::Other
        }
    }
}

/// An open V4L2 stream
struct V4l2Stream {
    id: String,
    settings: TrackSettings,
    frames: FrameReceiver,
    frame_loop: Mutex<Option<FrameLoop>>,
}

impl V4l2Stream {
    async fn open(
        device: CameraDevice,
        width: u32,
        height: u32,
        constraints: StreamConstraints,
    ) -> AcquisitionResult<Self> {
        let (sender, frames) = watch::channel(None);
        let path = device.id.clone();
        let id = uuid::Uuid::new_v4().to_string();

        let (frame_loop, (actual_width, actual_height)) = FrameLoop::start(
            &format!("v4l2-{}", device.id.trim_start_matches("/dev/")),
            move || {
                let state = CaptureState::open(&path, width, height, sender)?;
                if !constraints.accepts(state.width, state.height) {
                    return Err(AcquisitionError::ConstraintsNotSatisfiable);
                }
                let size = (state.width, state.height);
                Ok((state, size))
            },
            CaptureState::step,
        )
        .await?;

        Ok(Self {
            id,
            settings: TrackSettings {
                device_id: device.id,
                label: device.label,
                facing: device.facing,
                width: actual_width,
                height: actual_height,
            },
            frames,
            frame_loop: Mutex::new(Some(frame_loop)),
        })
    }
}

impl MediaStream for V4l2Stream {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    fn frames(&self) -> FrameReceiver {
        self.frames.clone()
    }

    fn stop(&self) {
        let frame_loop = self
            .frame_loop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(mut frame_loop) = frame_loop {
            frame_loop.stop();
            info!(stream = %self.id, device = %self.settings.device_id, "V4L2 stream stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.frame_loop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(FrameLoop::is_running)
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
