// SPDX-License-Identifier: MPL-2.0

//! fitcam - camera capture client for outfit feedback
//!
//! Acquires a camera stream, captures stills on demand, on a countdown or
//! periodically, and sends them to a remote fashion analysis service.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: camera platforms (V4L2, virtual), device probing and stream acquisition
//! - [`pipelines`]: still capture and JPEG encoding
//! - [`analysis`]: request shaping, the analysis service client and style references
//! - [`app`]: the capture session state machine and its runtime
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```ignore
//! let config = fitcam::Config::load()?;
//! let client = fitcam::analysis::HttpAnalysisClient::new(&config.api_base_url, config.request_timeout())?;
//! let devices = fitcam::backends::platform(&fitcam::backends::PlatformKind::V4l2)?;
//! let (runtime, handle, events) =
//!     fitcam::app::SessionRuntime::new(&config, devices, std::sync::Arc::new(client));
//! tokio::spawn(runtime.run());
//! handle.send(fitcam::app::Message::Start);
//! ```

pub mod analysis;
pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;

// Re-export commonly used types
pub use app::{Message, SessionHandle, SessionRuntime, SessionState};
pub use config::Config;
pub use errors::{AppError, AppResult};
