// SPDX-License-Identifier: GPL-3.0-only

//! Capture scheduling handlers
//!
//! Manual countdown, periodic auto trigger, pause and analysis results. Every
//! trigger funnels through [`CaptureSession::begin_capture`], which moves the
//! session to `Analyzing` before anything asynchronous starts; that state is
//! the only gate against overlapping requests.

use crate::analysis::{AnalysisBackend, CaptureMode, Season, StyleReferenceSet, build_request};
use crate::app::state::{AnalysisCompletion, CaptureSession, Message, SessionEvent, SessionState};
use crate::app::task::Task;
use crate::constants::encoding;
use crate::errors::CaptureSkipped;
use crate::pipelines::photo::CaptureFrame;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Build and submit one request; the frame is dropped once it is encoded
pub(crate) async fn run_analysis(
    backend: Arc<dyn AnalysisBackend>,
    frame: CaptureFrame,
    mode: CaptureMode,
    season: Season,
    styles: StyleReferenceSet,
) -> AnalysisCompletion {
    let request = build_request(&frame, mode, season, &styles);
    drop(frame);
    match backend.submit(request).await {
        Ok(outcome) => AnalysisCompletion::Done(outcome),
        Err(error) => AnalysisCompletion::Failed(error),
    }
}

impl CaptureSession {
    // =========================================================================
    // Capture Trigger Handlers
    // =========================================================================

    /// Start the countdown, or cancel it when one is already running
    pub(crate) fn handle_take_photo(&mut self) -> Task {
        match self.state {
            SessionState::CountingDown { remaining } => {
                info!(remaining, "Countdown cancelled");
                self.cancel_countdown();
                self.state = self.live_state();
                Task::none()
            }
            SessionState::Live | SessionState::Paused => {
                let ticks = self.schedule.countdown_ticks;
                info!(seconds = ticks, "Countdown started");
                self.state = SessionState::CountingDown { remaining: ticks };
                self.emit(SessionEvent::Countdown(ticks));
                if ticks == 0 {
                    self.arm_countdown(self.schedule.settle, Message::Shutter)
                } else {
                    self.arm_countdown(self.schedule.countdown_tick, Message::CountdownTick)
                }
            }
            SessionState::Analyzing => {
                debug!("Analysis in flight, ignoring take photo");
                Task::none()
            }
            _ => {
                self.notice("Start the camera first, or analyze a photo file");
                Task::none()
            }
        }
    }

    pub(crate) fn handle_countdown_tick(&mut self) -> Task {
        let SessionState::CountingDown { remaining } = self.state else {
            debug!(state = %self.state, "Countdown tick outside countdown");
            return Task::none();
        };

        let remaining = remaining.saturating_sub(1);
        self.state = SessionState::CountingDown { remaining };
        self.emit(SessionEvent::Countdown(remaining));
        debug!(remaining, "Countdown tick");

        if remaining == 0 {
            // Let the final digit show before the shutter fires
            self.arm_countdown(self.schedule.settle, Message::Shutter)
        } else {
            self.arm_countdown(self.schedule.countdown_tick, Message::CountdownTick)
        }
    }

    pub(crate) fn handle_shutter(&mut self) -> Task {
        if self.state != (SessionState::CountingDown { remaining: 0 }) {
            debug!(state = %self.state, "Shutter outside countdown");
            return Task::none();
        }
        self.countdown_timer = None;
        self.begin_capture("countdown")
    }

    /// Periodic auto trigger; dropped unless Live and not paused
    pub(crate) fn handle_periodic_tick(&mut self, generation: u64) -> Task {
        if generation != self.camera_generation || !self.state.has_camera() {
            return Task::none();
        }

        let next = self.schedule_periodic();
        if self.state == SessionState::Live && !self.paused {
            Task::batch([next, self.begin_capture("periodic")])
        } else {
            debug!(state = %self.state, paused = self.paused, "Periodic tick dropped");
            next
        }
    }

    pub(crate) fn handle_toggle_pause(&mut self) -> Task {
        match self.state {
            SessionState::Live => {
                self.paused = true;
                self.state = SessionState::Paused;
            }
            SessionState::Paused => {
                self.paused = false;
                self.state = SessionState::Live;
            }
            // Honoured once the countdown or analysis settles
            SessionState::CountingDown { .. } | SessionState::Analyzing
                if self.resume_state.is_none() =>
            {
                self.paused = !self.paused;
            }
            _ => {
                self.notice("Nothing to pause, the camera is not running");
                return Task::none();
            }
        }
        info!(paused = self.paused, "Live feedback toggled");
        Task::none()
    }

    /// Fold a finished analysis back into the session
    ///
    /// Results from a superseded request, or arriving after the session left
    /// `Analyzing`, are discarded without touching the displayed feedback.
    pub(crate) fn handle_analysis_finished(
        &mut self,
        seq: u64,
        completion: AnalysisCompletion,
    ) -> Task {
        if seq != self.analysis_seq || self.state != SessionState::Analyzing {
            debug!(
                seq,
                current = self.analysis_seq,
                state = %self.state,
                "Ignoring stale analysis result"
            );
            return Task::none();
        }

        let resume = self.resume_state.take();
        self.state = match resume {
            Some(state) => state,
            None => self.live_state(),
        };

        match completion {
            AnalysisCompletion::Skipped(CaptureSkipped::EncodeFailed) => {
                self.encode_failures += 1;
                warn!(seq, failures = self.encode_failures, "Captured frame could not be encoded");
                if self.encode_failures == encoding::FAILURES_BEFORE_NOTICE {
                    self.notice("Camera frames cannot be encoded, try another camera");
                }
            }
            AnalysisCompletion::Skipped(reason) => {
                debug!(seq, %reason, "Capture skipped, waiting for the next trigger");
            }
            AnalysisCompletion::LoadFailed(error) => {
                warn!(%error, "Could not load image for analysis");
                self.notice(format!("Could not load image: {}", error));
            }
            AnalysisCompletion::Failed(error) => {
                self.encode_failures = 0;
                warn!(%error, seq, "Analysis failed");
                self.notice(format!("Analysis failed: {}", error));
            }
            AnalysisCompletion::Done(outcome) => {
                self.encode_failures = 0;
                let percent = outcome.confidence_percent();
                info!(
                    seq,
                    items = outcome.feedback.len(),
                    confidence = percent,
                    "Feedback updated"
                );
                self.feedback = outcome.feedback;
                self.confidence_score = outcome.confidence_score;
                self.overlay = outcome.overlay;
                self.emit(SessionEvent::Feedback {
                    items: self.feedback.clone(),
                    confidence_percent: percent,
                });
            }
        }
        Task::none()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Enter Analyzing and capture from the live surface
    pub(crate) fn begin_capture(&mut self, trigger: &'static str) -> Task {
        let Some(surface) = self.surface.clone() else {
            debug!(trigger, "No surface to capture from");
            self.state = self.live_state();
            return Task::none();
        };

        let seq = self.enter_analyzing(None);
        let capturer = self.capturer.clone();
        let backend = Arc::clone(&self.backend);
        let (mode, season, styles) = (self.mode, self.season, self.styles.clone());
        info!(trigger, seq, %mode, %season, "Capturing frame for analysis");

        Task::perform(async move {
            let completion = match capturer.try_capture(&surface).await {
                Ok(frame) => run_analysis(backend, frame, mode, season, styles).await,
                Err(reason) => AnalysisCompletion::Skipped(reason),
            };
            Message::AnalysisFinished { seq, completion }
        })
    }

    /// Move to Analyzing and return the sequence number of the new request
    pub(crate) fn enter_analyzing(&mut self, resume: Option<SessionState>) -> u64 {
        if !self.season_fixed {
            self.season = Season::current();
        }
        self.analysis_seq += 1;
        self.resume_state = resume;
        self.state = SessionState::Analyzing;
        self.analysis_seq
    }

    /// (Re)arm the periodic trigger for the current camera
    pub(crate) fn schedule_periodic(&mut self) -> Task {
        let Some(interval) = self.schedule.auto_interval else {
            return Task::none();
        };
        let (task, handle) = Task::delay(
            interval,
            Message::PeriodicTick {
                generation: self.camera_generation,
            },
        );
        if let Some(previous) = self.periodic_timer.replace(handle) {
            previous.abort();
        }
        task
    }

    fn arm_countdown(&mut self, delay: Duration, message: Message) -> Task {
        let (task, handle) = Task::delay(delay, message);
        if let Some(previous) = self.countdown_timer.replace(handle) {
            previous.abort();
        }
        task
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{AnalysisOutcome, FeedbackItem, OverlayData, Priority};
    use crate::app::state::testing::session;
    use crate::app::state::{AnalysisCompletion, CaptureSession, SessionEvent, SessionState};
    use crate::errors::CaptureSkipped;

    fn outcome() -> AnalysisOutcome {
        AnalysisOutcome {
            feedback: vec![FeedbackItem {
                category: "overall".to_string(),
                message: "Nice layering".to_string(),
                priority: Priority::Medium,
                confidence: 0.7,
                actionable: true,
            }],
            confidence_score: 0.7,
            overlay: OverlayData::default(),
            processing_time: None,
        }
    }

    #[tokio::test]
    async fn test_periodic_ticks_dropped_while_analyzing() {
        let (mut session, _events) = session();
        session.state = SessionState::Analyzing;
        session.analysis_seq = 3;
        let generation = session.camera_generation;

        for _ in 0..5 {
            let task = session.handle_periodic_tick(generation);
            // Only the re-armed timer, no capture
            assert_eq!(task.into_futures().len(), 1);
        }
        assert_eq!(session.analysis_seq, 3);
        assert_eq!(session.state, SessionState::Analyzing);
    }

    #[tokio::test]
    async fn test_stale_generation_tick_is_ignored() {
        let (mut session, _events) = session();
        session.state = SessionState::Live;
        let stale = session.camera_generation;
        session.camera_generation += 1;

        assert!(session.handle_periodic_tick(stale).is_none());
        assert!(session.periodic_timer.is_none());
    }

    #[tokio::test]
    async fn test_countdown_reaches_zero_before_shutter() {
        let (mut session, mut events) = session();
        session.state = SessionState::Live;

        let _ = session.handle_take_photo();
        assert_eq!(session.state, SessionState::CountingDown { remaining: 5 });
        // Shutter before zero does nothing
        assert!(session.handle_shutter().is_none());

        for _ in 0..5 {
            let _ = session.handle_countdown_tick();
        }
        assert_eq!(session.state, SessionState::CountingDown { remaining: 0 });

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Countdown(n) = event {
                seen.push(n);
            }
        }
        assert_eq!(seen, vec![5, 4, 3, 2, 1, 0]);

        // No surface to read from: the capture is skipped and the session settles
        let _ = session.handle_shutter();
        assert_eq!(session.state, SessionState::Live);
    }

    #[tokio::test]
    async fn test_second_press_cancels_countdown() {
        let (mut session, _events) = session();
        session.state = SessionState::Paused;
        session.paused = true;

        let _ = session.handle_take_photo();
        assert!(session.countdown_timer.is_some());
        let _ = session.handle_take_photo();
        assert!(session.countdown_timer.is_none());
        assert_eq!(session.state, SessionState::Paused);
    }

    #[tokio::test]
    async fn test_result_after_stop_is_discarded() {
        let (mut session, _events) = session();
        session.state = SessionState::Analyzing;
        session.analysis_seq = 1;

        let _ = session.handle_stop();
        let _ = session.handle_analysis_finished(1, AnalysisCompletion::Done(outcome()));

        assert_eq!(session.state, SessionState::Idle);
        assert!(session.feedback.is_empty());
    }

    #[tokio::test]
    async fn test_superseded_result_is_discarded() {
        let (mut session, _events) = session();
        session.state = SessionState::Analyzing;
        session.analysis_seq = 2;

        let _ = session.handle_analysis_finished(1, AnalysisCompletion::Done(outcome()));
        assert_eq!(session.state, SessionState::Analyzing);
        assert!(session.feedback.is_empty());

        let _ = session.handle_analysis_finished(2, AnalysisCompletion::Done(outcome()));
        assert_eq!(session.state, SessionState::Live);
        assert_eq!(session.feedback.len(), 1);
    }

    #[tokio::test]
    async fn test_pause_during_analysis_settles_in_paused() {
        let (mut session, _events) = session();
        session.state = SessionState::Analyzing;
        session.analysis_seq = 1;

        let _ = session.handle_toggle_pause();
        assert_eq!(session.state, SessionState::Analyzing);
        assert!(session.paused);

        let _ = session.handle_analysis_finished(
            1,
            AnalysisCompletion::Failed(crate::errors::AnalysisError::HttpStatus(500)),
        );
        assert_eq!(session.state, SessionState::Paused);
    }

    #[tokio::test]
    async fn test_repeated_encode_failures_raise_one_notice() {
        fn finish(session: &mut CaptureSession, completion: AnalysisCompletion) {
            session.state = SessionState::Analyzing;
            session.analysis_seq += 1;
            let seq = session.analysis_seq;
            let _ = session.handle_analysis_finished(seq, completion);
        }

        let (mut session, mut events) = session();

        for _ in 0..4 {
            finish(
                &mut session,
                AnalysisCompletion::Skipped(CaptureSkipped::EncodeFailed),
            );
        }
        assert_eq!(session.state, SessionState::Live);
        assert_eq!(session.encode_failures, 4);

        finish(&mut session, AnalysisCompletion::Done(outcome()));
        assert_eq!(session.encode_failures, 0);
        // Not-ready ticks are routine and never counted
        finish(&mut session, AnalysisCompletion::Skipped(CaptureSkipped::NotReady));
        assert_eq!(session.encode_failures, 0);

        let notices = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| matches!(e, SessionEvent::Notice(m) if m.contains("encoded")))
            .count();
        assert_eq!(notices, 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_feedback() {
        let (mut session, mut events) = session();
        session.state = SessionState::Analyzing;
        session.analysis_seq = 1;
        let _ = session.handle_analysis_finished(1, AnalysisCompletion::Done(outcome()));
        let before = session.feedback.clone();

        session.state = SessionState::Analyzing;
        session.analysis_seq = 2;
        let _ = session.handle_analysis_finished(
            2,
            AnalysisCompletion::Failed(crate::errors::AnalysisError::HttpStatus(500)),
        );

        assert_eq!(session.feedback, before);
        assert_eq!(session.state, SessionState::Live);
        let notices: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| matches!(e, SessionEvent::Notice(m) if m.contains("500")))
            .collect();
        assert_eq!(notices.len(), 1);
    }
}
