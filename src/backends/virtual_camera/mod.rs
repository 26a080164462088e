// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera platform
//!
//! Synthetic cameras that implement [`MediaDevices`] without hardware. Used by
//! `--virtual` on the command line and by the test suite, which can script
//! the failure modes real platforms produce: no camera API, no enumeration,
//! denied permission, busy devices and unplugged cameras.
//!
//! ```text
//! get_user_media()
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ select device    │  ← Same constraint matching as V4L2
//! └──────────────────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ producer task    │  ← Warmup delay, then a frame every tick
//! └──────────────────┘
//!        │
//!        ▼
//!    VideoSurface
//! ```

mod file_source;

pub use file_source::{decode_to_frame, load_camera_frame, load_still_image};

use crate::backends::camera::types::{
    CameraDevice, CameraFrame, DeviceKind, Facing, FrameSender, PermissionState, PixelFormat,
    StreamConstraints, TrackSettings,
};
use crate::backends::camera::{MediaDevices, MediaStream};
use crate::constants::virtual_camera as vc;
use crate::errors::{AcquisitionError, AcquisitionResult};
use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct VirtualCamera {
    id: String,
    label: String,
    facing: Option<Facing>,
    source: Option<Arc<CameraFrame>>,
}

impl VirtualCamera {
    fn native_size(&self) -> (u32, u32) {
        self.source
            .as_ref()
            .map(|f| (f.width, f.height))
            .unwrap_or(vc::PATTERN_SIZE)
    }

    fn as_device(&self) -> CameraDevice {
        CameraDevice {
            id: self.id.clone(),
            label: self.label.clone(),
            kind: DeviceKind::VideoInput,
            facing: self.facing,
            resolutions: vec![self.native_size()],
        }
    }
}

struct Settings {
    cameras: Vec<VirtualCamera>,
    next_id: usize,
    permission: PermissionState,
    supported: bool,
    enumeration: bool,
    permission_query: bool,
    warmup: Duration,
    acquire_delay: Duration,
    busy: HashSet<String>,
}

struct Inner {
    settings: Mutex<Settings>,
    requests: Mutex<Vec<StreamConstraints>>,
    open_streams: AtomicUsize,
    max_open_streams: AtomicUsize,
    changes: broadcast::Sender<()>,
    /// Camera id to unplug, `None` for every camera
    disconnects: broadcast::Sender<Option<String>>,
}

/// Scriptable in-process camera platform
///
/// Clones share the same cameras and counters.
#[derive(Clone)]
pub struct VirtualDevices {
    inner: Arc<Inner>,
}

impl Default for VirtualDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDevices {
    /// A platform with no cameras
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        let (disconnects, _) = broadcast::channel(4);
        Self {
            inner: Arc::new(Inner {
                settings: Mutex::new(Settings {
                    cameras: Vec::new(),
                    next_id: 0,
                    permission: PermissionState::Granted,
                    supported: true,
                    enumeration: true,
                    permission_query: true,
                    warmup: vc::WARMUP,
                    acquire_delay: Duration::ZERO,
                    busy: HashSet::new(),
                }),
                requests: Mutex::new(Vec::new()),
                open_streams: AtomicUsize::new(0),
                max_open_streams: AtomicUsize::new(0),
                changes,
                disconnects,
            }),
        }
    }

    /// A single front camera (a typical laptop)
    pub fn front_only() -> Self {
        let devices = Self::new();
        devices.push_camera("Virtual Front Camera", Some(Facing::User), None);
        devices
    }

    /// A front and a rear camera (a typical phone)
    pub fn front_and_rear() -> Self {
        let devices = Self::front_only();
        devices.push_camera("Virtual Rear Camera", Some(Facing::Environment), None);
        devices
    }

    /// A platform without any camera API
    pub fn unsupported() -> Self {
        let devices = Self::new();
        devices.settings().supported = false;
        devices
    }

    /// A camera that shows a still image instead of the test pattern
    pub fn from_image(label: &str, facing: Option<Facing>, frame: CameraFrame) -> Self {
        let devices = Self::new();
        devices.push_camera(label, facing, Some(Arc::new(frame)));
        devices
    }

    pub fn with_permission(self, permission: PermissionState) -> Self {
        self.set_permission(permission);
        self
    }

    pub fn without_enumeration(self) -> Self {
        self.settings().enumeration = false;
        self
    }

    pub fn without_permission_query(self) -> Self {
        self.settings().permission_query = false;
        self
    }

    /// Delay before the first frame of a new stream
    pub fn with_warmup(self, warmup: Duration) -> Self {
        self.settings().warmup = warmup;
        self
    }

    /// Delay inside every `get_user_media` call
    pub fn with_acquire_delay(self, delay: Duration) -> Self {
        self.settings().acquire_delay = delay;
        self
    }

    pub fn set_permission(&self, permission: PermissionState) {
        self.settings().permission = permission;
    }

    /// Mark a camera as held by another process
    pub fn set_busy(&self, camera_id: &str, busy: bool) {
        let mut settings = self.settings();
        if busy {
            settings.busy.insert(camera_id.to_string());
        } else {
            settings.busy.remove(camera_id);
        }
    }

    /// Plug in a camera and notify listeners
    pub fn add_camera(&self, label: &str, facing: Option<Facing>) -> String {
        let id = self.push_camera(label, facing, None);
        info!(id = %id, label, "Virtual camera added");
        let _ = self.inner.changes.send(());
        id
    }

    /// Unplug a camera, ending its streams, and notify listeners
    pub fn remove_camera(&self, camera_id: &str) {
        self.settings().cameras.retain(|c| c.id != camera_id);
        info!(id = camera_id, "Virtual camera removed");
        let _ = self.inner.disconnects.send(Some(camera_id.to_string()));
        let _ = self.inner.changes.send(());
    }

    /// End every open stream as if the hardware disappeared
    pub fn disconnect_all(&self) {
        info!("Disconnecting all virtual streams");
        let _ = self.inner.disconnects.send(None);
        let _ = self.inner.changes.send(());
    }

    /// Every constraint set passed to `get_user_media`, in order
    pub fn requests(&self) -> Vec<StreamConstraints> {
        lock(&self.inner.requests).clone()
    }

    /// Number of `get_user_media` calls so far
    pub fn open_calls(&self) -> usize {
        lock(&self.inner.requests).len()
    }

    /// Streams currently holding a camera
    pub fn active_streams(&self) -> usize {
        self.inner.open_streams.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously held streams
    pub fn max_concurrent_streams(&self) -> usize {
        self.inner.max_open_streams.load(Ordering::SeqCst)
    }

    fn push_camera(
        &self,
        label: &str,
        facing: Option<Facing>,
        source: Option<Arc<CameraFrame>>,
    ) -> String {
        let mut settings = self.settings();
        let id = format!("virtual-{}", settings.next_id);
        settings.next_id += 1;
        settings.cameras.push(VirtualCamera {
            id: id.clone(),
            label: label.to_string(),
            facing,
            source,
        });
        id
    }

    fn settings(&self) -> MutexGuard<'_, Settings> {
        lock(&self.inner.settings)
    }

    async fn open(&self, constraints: StreamConstraints) -> AcquisitionResult<Box<dyn MediaStream>> {
        lock(&self.inner.requests).push(constraints);

        let delay = self.settings().acquire_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (camera, warmup, size) = {
            let mut settings = self.settings();
            if !settings.supported {
                return Err(AcquisitionError::NotSupported);
            }
            match settings.permission {
                PermissionState::Denied => return Err(AcquisitionError::PermissionDenied),
                PermissionState::Prompt => settings.permission = PermissionState::Granted,
                PermissionState::Granted | PermissionState::Unknown => {}
            }

            let devices: Vec<CameraDevice> =
                settings.cameras.iter().map(VirtualCamera::as_device).collect();
            let device = constraints.select_device(&devices)?;
            if settings.busy.contains(&device.id) {
                return Err(AcquisitionError::Unknown(format!(
                    "{} is busy",
                    device.label
                )));
            }
            let size = constraints.pick_resolution(&device.resolutions)?;
            let camera = settings
                .cameras
                .iter()
                .find(|c| c.id == device.id)
                .cloned()
                .ok_or(AcquisitionError::DeviceNotFound)?;
            (camera, settings.warmup, size)
        };

        Ok(Box::new(VirtualStream::spawn(
            Arc::clone(&self.inner),
            &camera,
            size,
            warmup,
        )))
    }
}

impl MediaDevices for VirtualDevices {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn is_supported(&self) -> bool {
        self.settings().supported
    }

    fn enumerate_devices(&self) -> BoxFuture<'_, Option<Vec<CameraDevice>>> {
        let settings = self.settings();
        let devices = settings
            .enumeration
            .then(|| settings.cameras.iter().map(VirtualCamera::as_device).collect());
        drop(settings);
        futures::future::ready(devices).boxed()
    }

    fn query_permission(&self) -> BoxFuture<'_, Option<PermissionState>> {
        let settings = self.settings();
        let permission = settings.permission_query.then_some(settings.permission);
        drop(settings);
        futures::future::ready(permission).boxed()
    }

    fn get_user_media(
        &self,
        constraints: StreamConstraints,
    ) -> BoxFuture<'_, AcquisitionResult<Box<dyn MediaStream>>> {
        self.open(constraints).boxed()
    }

    fn device_changes(&self) -> Option<BoxStream<'static, ()>> {
        let mut changes = self.inner.changes.subscribe();
        Some(
            async_stream::stream! {
                loop {
                    match changes.recv().await {
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => yield (),
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            .boxed(),
        )
    }
}

/// A stream produced by a virtual camera
struct VirtualStream {
    id: String,
    settings: TrackSettings,
    frames: watch::Receiver<Option<Arc<CameraFrame>>>,
    producer: tokio::task::JoinHandle<()>,
    released: AtomicBool,
    inner: Arc<Inner>,
}

impl VirtualStream {
    fn spawn(inner: Arc<Inner>, camera: &VirtualCamera, size: (u32, u32), warmup: Duration) -> Self {
        let (width, height) = size;
        let template = match &camera.source {
            Some(frame) => CameraFrame::clone(frame),
            None => color_bars(width, height),
        };

        let (sender, frames) = watch::channel(None);
        let disconnect = inner.disconnects.subscribe();
        let producer = tokio::spawn(produce(
            sender,
            template,
            warmup,
            camera.id.clone(),
            disconnect,
        ));

        let open = inner.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_open_streams.fetch_max(open, Ordering::SeqCst);

        let id = uuid::Uuid::new_v4().to_string();
        debug!(stream = %id, camera = %camera.id, width, height, "Virtual stream opened");

        Self {
            id,
            settings: TrackSettings {
                device_id: camera.id.clone(),
                label: camera.label.clone(),
                facing: camera.facing,
                width,
                height,
            },
            frames,
            producer,
            released: AtomicBool::new(false),
            inner,
        }
    }
}

impl MediaStream for VirtualStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    fn frames(&self) -> watch::Receiver<Option<Arc<CameraFrame>>> {
        self.frames.clone()
    }

    fn stop(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.producer.abort();
            self.inner.open_streams.fetch_sub(1, Ordering::SeqCst);
            debug!(stream = %self.id, "Virtual stream stopped");
        }
    }

    fn is_active(&self) -> bool {
        !self.released.load(Ordering::SeqCst) && !self.producer.is_finished()
    }
}

impl Drop for VirtualStream {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn produce(
    sender: FrameSender,
    template: CameraFrame,
    warmup: Duration,
    camera_id: String,
    mut disconnect: broadcast::Receiver<Option<String>>,
) {
    tokio::select! {
        _ = tokio::time::sleep(warmup) => {}
        _ = unplugged(&mut disconnect, &camera_id) => return,
    }

    let mut ticker = tokio::time::interval(vc::FRAME_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = CameraFrame {
                    captured_at: Instant::now(),
                    ..template.clone()
                };
                sender.send_replace(Some(Arc::new(frame)));
            }
            _ = unplugged(&mut disconnect, &camera_id) => {
                debug!(camera = %camera_id, "Virtual stream disconnected");
                return;
            }
        }
    }
}

/// Resolves once `camera_id` (or every camera) is unplugged
async fn unplugged(disconnect: &mut broadcast::Receiver<Option<String>>, camera_id: &str) {
    loop {
        match disconnect.recv().await {
            Ok(Some(id)) if id != camera_id => continue,
            _ => return,
        }
    }
}

/// Eight vertical colour bars, RGBA
fn color_bars(width: u32, height: u32) -> CameraFrame {
    const BARS: [[u8; 3]; 8] = [
        [235, 235, 235],
        [235, 235, 16],
        [16, 235, 235],
        [16, 235, 16],
        [235, 16, 235],
        [235, 16, 16],
        [16, 16, 235],
        [16, 16, 16],
    ];

    let bar_width = (width / BARS.len() as u32).max(1);
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for _ in 0..height {
        for x in 0..width {
            let [r, g, b] = BARS[((x / bar_width) as usize).min(BARS.len() - 1)];
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }

    CameraFrame {
        width,
        height,
        data: Arc::from(data.into_boxed_slice()),
        format: PixelFormat::RGBA,
        stride: width * 4,
        captured_at: Instant::now(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{DimensionConstraint, FacingConstraint, FocusMode};

    fn constraints(facing: FacingConstraint) -> StreamConstraints {
        StreamConstraints {
            facing,
            width: DimensionConstraint { ideal: 1280, min: 640 },
            height: DimensionConstraint { ideal: 720, min: 480 },
            focus_mode: FocusMode::Continuous,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_produces_frames_after_warmup() {
        let devices = VirtualDevices::front_only();
        let stream = devices
            .get_user_media(constraints(FacingConstraint::Exact(Facing::User)))
            .await;
        let Ok(stream) = stream else {
            panic!("virtual stream should open");
        };

        let mut frames = stream.frames();
        assert!(frames.borrow().is_none());

        let frame = frames.wait_for(|f| f.is_some()).await.ok().and_then(|f| f.clone());
        let frame = frame.unwrap_or_else(|| panic!("no frame"));
        assert_eq!((frame.width, frame.height), vc::PATTERN_SIZE);
        assert!(frame.is_decodable());
    }

    #[tokio::test]
    async fn test_stop_closes_frames() {
        let devices = VirtualDevices::front_only().with_warmup(Duration::ZERO);
        let Ok(stream) = devices
            .get_user_media(constraints(FacingConstraint::Ideal(Facing::User)))
            .await
        else {
            panic!("virtual stream should open");
        };
        let mut frames = stream.frames();

        stream.stop();
        stream.stop();
        assert_eq!(devices.active_streams(), 0);

        while frames.changed().await.is_ok() {}
        assert!(!stream.is_active());
    }

    #[tokio::test]
    async fn test_busy_camera() {
        let devices = VirtualDevices::front_only();
        devices.set_busy("virtual-0", true);
        let result = devices
            .get_user_media(constraints(FacingConstraint::Exact(Facing::User)))
            .await;
        assert!(matches!(result, Err(AcquisitionError::Unknown(_))));
    }

    #[tokio::test]
    async fn test_prompt_is_granted_on_open() {
        let devices = VirtualDevices::front_only().with_permission(PermissionState::Prompt);
        let stream = devices
            .get_user_media(constraints(FacingConstraint::Exact(Facing::User)))
            .await;
        assert!(stream.is_ok());
        assert_eq!(
            devices.query_permission().await,
            Some(PermissionState::Granted)
        );
    }

    #[tokio::test]
    async fn test_unplug_ends_only_that_camera() {
        let devices = VirtualDevices::front_and_rear().with_warmup(Duration::ZERO);
        let front = devices
            .get_user_media(constraints(FacingConstraint::Exact(Facing::User)))
            .await;
        let rear = devices
            .get_user_media(constraints(FacingConstraint::Exact(Facing::Environment)))
            .await;
        let (Ok(front), Ok(rear)) = (front, rear) else {
            panic!("virtual streams should open");
        };
        let mut rear_frames = rear.frames();

        devices.remove_camera("virtual-1");

        while rear_frames.changed().await.is_ok() {}
        assert!(front.is_active());
        let mut front_frames = front.frames();
        assert!(front_frames.changed().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_picture_camera_repeats_the_picture() {
        let picture = CameraFrame {
            width: 800,
            height: 600,
            data: Arc::from(vec![7u8; 800 * 600 * 4]),
            format: PixelFormat::RGBA,
            stride: 800 * 4,
            captured_at: Instant::now(),
        };
        let devices = VirtualDevices::from_image("Mirror", Some(Facing::User), picture);
        let Ok(stream) = devices
            .get_user_media(constraints(FacingConstraint::Exact(Facing::User)))
            .await
        else {
            panic!("picture stream should open");
        };
        assert_eq!((stream.settings().width, stream.settings().height), (800, 600));

        let mut frames = stream.frames();
        let frame = frames.wait_for(|f| f.is_some()).await.ok().and_then(|f| f.clone());
        assert!(frame.is_some_and(|f| f.width == 800 && f.data[0] == 7));
    }

    #[test]
    fn test_color_bars_size() {
        let frame = color_bars(64, 8);
        assert_eq!(frame.data.len(), 64 * 8 * 4);
        assert_eq!(&frame.data[..4], &[235, 235, 235, 255]);
    }
}
