// SPDX-License-Identifier: GPL-3.0-only

//! Message update handling
//!
//! `update()` is the session's single transition function. It routes each
//! message to a handler method; the handlers live in the `handlers`
//! submodules, grouped by concern:
//!
//! - `handlers::camera`: start, stop, switch, stream end, device topology
//! - `handlers::capture`: countdown, periodic trigger, pause, analysis results
//! - `handlers::style`: mode, season, style references, upload fallback

use crate::app::state::{CaptureSession, Message, SessionEvent};
use crate::app::task::Task;
use tracing::debug;

impl CaptureSession {
    /// Apply one message and return the follow-up work
    ///
    /// A `StateChanged` event is emitted whenever the message moved the
    /// session to a different state.
    pub fn update(&mut self, message: Message) -> Task {
        let before = self.state.clone();
        let task = self.dispatch(message);
        if self.state != before {
            debug!(from = %before, to = %self.state, "Session state changed");
            self.emit(SessionEvent::StateChanged(self.state.clone()));
        }
        task
    }

    fn dispatch(&mut self, message: Message) -> Task {
        match message {
            // ===== Camera =====
            Message::Start => self.handle_start(),
            Message::Stop => self.handle_stop(),
            Message::SwitchCamera => self.handle_switch_camera(),
            Message::Shutdown => self.handle_shutdown(),
            Message::CameraStarted { generation, result } => {
                self.handle_camera_started(generation, result)
            }
            Message::CameraSwitched { generation, result } => {
                self.handle_camera_switched(generation, result)
            }
            Message::StreamEnded { generation } => self.handle_stream_ended(generation),
            Message::RefreshDevices => self.handle_refresh_devices(),
            Message::DevicesRefreshed {
                cameras,
                permission,
            } => self.handle_devices_refreshed(cameras, permission),
            Message::DevicesChanged(cameras) => self.handle_devices_changed(cameras),

            // ===== Capture =====
            Message::TakePhoto => self.handle_take_photo(),
            Message::CountdownTick => self.handle_countdown_tick(),
            Message::Shutter => self.handle_shutter(),
            Message::PeriodicTick { generation } => self.handle_periodic_tick(generation),
            Message::TogglePause => self.handle_toggle_pause(),
            Message::AnalysisFinished { seq, completion } => {
                self.handle_analysis_finished(seq, completion)
            }

            // ===== Context =====
            Message::SetMode(mode) => self.handle_set_mode(mode),
            Message::SetSeason(season) => self.handle_set_season(season),
            Message::AnalyzeFile(path) => self.handle_analyze_file(path),
            Message::AddStyleReference(path) => self.handle_add_style_reference(path),
            Message::RemoveStyleReference(index) => self.handle_remove_style_reference(index),
            Message::ClearStyleReferences => self.handle_clear_style_references(),
            Message::StyleReferenceLoaded { name, result } => {
                self.handle_style_reference_loaded(name, result)
            }
        }
    }
}
