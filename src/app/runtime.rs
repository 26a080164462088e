// SPDX-License-Identifier: GPL-3.0-only

//! Single-task driver for a capture session
//!
//! ```text
//!   SessionHandle ──Message──▶ inbox ─┐
//!   device changes ───────────────────┼─▶ CaptureSession::update ─▶ Task futures
//!   finished Task futures ────────────┘            │
//!                                                  ├─▶ watch<SessionSnapshot>
//!                                                  └─▶ SessionEvent channel
//! ```
//!
//! Everything runs on the task that awaits [`SessionRuntime::run`]; there are
//! no worker threads. Dropping the runtime drops every pending timer.

use super::state::{CaptureSession, Message, SessionEvent, SessionParts, SessionSnapshot};
use crate::analysis::AnalysisBackend;
use crate::backends::camera::{CameraDevice, DeviceProber, MediaDevices, StreamAcquirer};
use crate::config::Config;
use crate::pipelines::photo::{FrameCapturer, PhotoEncoder};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, FuturesUnordered};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Receiver of one-shot session events
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Owns a [`CaptureSession`] and feeds it messages
pub struct SessionRuntime {
    session: CaptureSession,
    inbox: mpsc::UnboundedReceiver<Message>,
    snapshot: watch::Sender<SessionSnapshot>,
    topology: BoxStream<'static, Vec<CameraDevice>>,
}

impl SessionRuntime {
    /// Wire a session for `devices` and `backend` from `config`
    pub fn new(
        config: &Config,
        devices: Arc<dyn MediaDevices>,
        backend: Arc<dyn AnalysisBackend>,
    ) -> (Self, SessionHandle, EventReceiver) {
        let schedule = config.schedule();
        let prober = DeviceProber::new(Arc::clone(&devices));
        let topology = prober.topology_updates();
        let parts = SessionParts {
            prober,
            acquirer: StreamAcquirer::new(
                devices,
                config.width_constraint(),
                config.height_constraint(),
                config.default_facing,
            ),
            capturer: FrameCapturer::new(
                PhotoEncoder::new(config.jpeg_quality),
                schedule.ready_timeout,
            ),
            backend,
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = CaptureSession::new(
            parts,
            schedule,
            config.default_facing,
            config.capture_mode,
            config.season,
            events_tx,
        );

        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

        let runtime = Self {
            session,
            inbox,
            snapshot: snapshot_tx,
            topology,
        };
        let handle = SessionHandle {
            sender: inbox_tx,
            snapshot: snapshot_rx,
        };
        (runtime, handle, events_rx)
    }

    /// Run until `Shutdown` is received or every handle is dropped
    ///
    /// On exit the camera has been released and all timers are gone.
    pub async fn run(self) {
        let Self {
            mut session,
            mut inbox,
            snapshot,
            mut topology,
        } = self;
        let mut tasks: FuturesUnordered<BoxFuture<'static, Option<Message>>> =
            FuturesUnordered::new();

        tasks.extend(session.update(Message::RefreshDevices).into_futures());
        snapshot.send_replace(session.snapshot());
        info!("Capture session running");

        loop {
            let message = tokio::select! {
                message = inbox.recv() => message.unwrap_or(Message::Shutdown),
                Some(output) = tasks.next(), if !tasks.is_empty() => match output {
                    Some(message) => message,
                    // Aborted timer or side-effect only
                    None => continue,
                },
                Some(cameras) = topology.next() => Message::DevicesChanged(cameras),
            };

            let shutdown = matches!(message, Message::Shutdown);
            let task = session.update(message);

            if shutdown {
                // An in-flight start or switch holds the acquirer lock
                debug!(pending = tasks.len(), "Dropping pending session tasks");
                drop(tasks);
                for future in task.into_futures() {
                    future.await;
                }
                snapshot.send_replace(session.snapshot());
                break;
            }

            tasks.extend(task.into_futures());
            snapshot.send_replace(session.snapshot());
        }

        info!("Capture session stopped");
    }
}

/// Cloneable front end of a running session
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::UnboundedSender<Message>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Queue a message; `false` once the runtime has stopped
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }

    /// State as of the last processed message
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until a snapshot satisfies `predicate`
    ///
    /// Returns `None` if the runtime stops first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut receiver = self.snapshot.clone();
        receiver
            .wait_for(predicate)
            .await
            .ok()
            .map(|snapshot| (*snapshot).clone())
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
