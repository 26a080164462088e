// SPDX-License-Identifier: GPL-3.0-only

//! Message handler modules
//!
//! Handlers are grouped by concern and all extend [`CaptureSession`](crate::app::CaptureSession).

pub mod camera;
pub mod capture;
pub mod style;
