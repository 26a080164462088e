// SPDX-License-Identifier: GPL-3.0-only
//! Dedicated thread driving a blocking capture device
//!
//! Device I/O on V4L2 blocks, so each open stream gets its own thread. The
//! thread opens the device itself and reports the outcome back through a
//! oneshot handshake before it starts pulling frames.

use crate::errors::{AcquisitionError, AcquisitionResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Returned by each loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Handle to a running capture thread
///
/// Dropping the handle stops the thread and waits for it, which releases
/// whatever device the thread holds.
pub struct FrameLoop {
    thread: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl FrameLoop {
    /// Spawn the thread and wait until `init` has run on it
    ///
    /// `init` opens the device and returns the loop state plus a value handed
    /// back to the caller (typically the negotiated settings). If it fails the
    /// thread exits and the error is returned here.
    pub async fn start<S, T, I, F>(name: &str, init: I, mut step: F) -> AcquisitionResult<(Self, T)>
    where
        T: Send + 'static,
        I: FnOnce() -> AcquisitionResult<(S, T)> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);
        let (ready_tx, ready_rx) = oneshot::channel();
        let thread_name = name.to_string();

        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = match init() {
                    Ok((state, handshake)) => {
                        if ready_tx.send(Ok(handshake)).is_err() {
                            debug!(name = %thread_name, "Caller went away before the loop started");
                            return;
                        }
                        state
                    }
                    Err(e) => {
                        warn!(name = %thread_name, error = %e, "Capture initialization failed");
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while !stop.load(Ordering::SeqCst) {
                    if step(&mut state) == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }
                info!(name = %thread_name, "Capture thread exiting");
            })
            .map_err(|e| AcquisitionError::Unknown(format!("failed to spawn capture thread: {}", e)))?;

        let mut frame_loop = Self {
            thread: Some(thread),
            stop_signal,
            name: name.to_string(),
        };

        match ready_rx.await {
            Ok(Ok(handshake)) => {
                info!(name = %frame_loop.name, "Capture thread running");
                Ok((frame_loop, handshake))
            }
            Ok(Err(e)) => {
                frame_loop.join();
                Err(e)
            }
            Err(_) => {
                frame_loop.join();
                Err(AcquisitionError::Unknown(
                    "capture thread terminated during initialization".to_string(),
                ))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop to stop and wait for the thread
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture thread joined");
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}
