// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines
//!
//! - [`photo`]: still capture from the live surface and JPEG encoding

pub mod photo;
