// SPDX-License-Identifier: MPL-2.0
// Camera backend with trait-based abstraction over the platform device API

//! Camera backend abstraction
//!
//! The platform's camera API is modelled as the [`MediaDevices`] trait. Each
//! platform (V4L2, virtual) implements it; everything above this layer only
//! talks to the trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  CaptureSession     │
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴───────┐
//!     ▼              ▼
//! ┌────────────┐ ┌──────────────┐
//! │DeviceProber│ │StreamAcquirer│  ← Owns the single active stream
//! └──────┬─────┘ └──────┬───────┘
//!        └──────┬───────┘
//!               ▼
//! ┌─────────────────────┐
//! │ MediaDevices trait  │  ← Enumeration, permission, acquisition
//! └──────────┬──────────┘
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐  ┌─────────┐
//!   │ V4L2 │  │ Virtual │
//!   └──────┘  └─────────┘
//! ```

pub mod acquirer;
pub mod format_converters;
pub mod frame_loop;
pub mod prober;
pub mod surface;
pub mod types;
pub mod v4l2;

pub use acquirer::{StreamAcquirer, SwitchFailure};
pub use prober::DeviceProber;
pub use surface::VideoSurface;
pub use types::*;

use crate::errors::AcquisitionResult;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

/// A live camera stream handle
///
/// Dropping the handle releases the hardware. `stop` does the same
/// eagerly and is safe to call more than once.
pub trait MediaStream: Send + Sync {
    /// Unique identifier of this stream instance
    fn id(&self) -> &str;

    /// Negotiated track settings
    fn settings(&self) -> &TrackSettings;

    /// Receiver for the most recent frame
    ///
    /// The channel closes when the stream stops or the device disappears.
    fn frames(&self) -> FrameReceiver;

    /// Release all tracks of the stream
    fn stop(&self);

    /// Whether the stream still holds the device
    fn is_active(&self) -> bool;
}

/// Platform camera API
///
/// Optional capabilities return `None` when the platform lacks them, so
/// callers can degrade instead of failing.
pub trait MediaDevices: Send + Sync {
    /// Human readable platform name
    fn name(&self) -> &'static str;

    /// Whether any camera API is present at all
    fn is_supported(&self) -> bool;

    /// Enumerate media devices, `None` if enumeration is unsupported
    fn enumerate_devices(&self) -> BoxFuture<'_, Option<Vec<CameraDevice>>>;

    /// Query the camera permission, `None` if the query is unsupported
    fn query_permission(&self) -> BoxFuture<'_, Option<PermissionState>>;

    /// Open a stream matching one constraint set
    fn get_user_media(
        &self,
        constraints: StreamConstraints,
    ) -> BoxFuture<'_, AcquisitionResult<Box<dyn MediaStream>>>;

    /// Stream of device topology change notifications, `None` if unsupported
    fn device_changes(&self) -> Option<BoxStream<'static, ()>>;
}
