// SPDX-License-Identifier: MPL-2.0

//! Capture session: scheduling captures and folding analysis results back
//!
//! # Architecture
//!
//! - `state`: session state, messages, events and the [`CaptureSession`] model
//! - `update`: the transition function, dispatching to `handlers`
//! - `handlers`: camera lifecycle, capture triggers, analysis context
//! - `task`: effects returned from `update` (futures, abortable timers)
//! - `runtime`: the driver loop and the [`SessionHandle`] front end
//!
//! # State machine
//!
//! ```text
//!            start                ready            take photo
//!   Idle ───────────▶ Initializing ─────▶ Live ─────────────▶ CountingDown
//!    ▲                    │               ▲ │ ▲                    │ 0 + settle
//!    │ stop               │ failure       │ │ └── periodic ──┐     ▼
//!    │                    ▼        pause  │ ▼                └── Analyzing
//!   any                 Error            Paused ◀──────────────────┘
//! ```
//!
//! `Analyzing` is the only gate against overlapping requests: every trigger
//! checks it synchronously inside `update` before any work is started.

mod handlers;
pub mod runtime;
pub mod state;
pub mod task;
mod update;

pub use runtime::{EventReceiver, SessionHandle, SessionRuntime};
pub use state::{
    AnalysisCompletion, CaptureSession, Message, SessionEvent, SessionParts, SessionSnapshot,
    SessionState,
};
pub use task::Task;
