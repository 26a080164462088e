// SPDX-License-Identifier: GPL-3.0-only

//! Effects returned by the session transition function
//!
//! A [`Task`] is a batch of futures, each resolving to at most one
//! [`Message`] that is fed back into `update`. Timers are abortable: their
//! [`AbortHandle`] is kept by the session and aborted on every path that
//! leaves the state they belong to.

use super::state::Message;
use futures::FutureExt;
use futures::future::{AbortHandle, BoxFuture, abortable};
use std::future::Future;
use std::time::Duration;

/// Work to run after a transition
#[must_use = "tasks do nothing unless handed to the runtime"]
pub struct Task {
    futures: Vec<BoxFuture<'static, Option<Message>>>,
}

impl Task {
    /// No follow-up work
    pub fn none() -> Self {
        Self {
            futures: Vec::new(),
        }
    }

    /// Run a future and feed its message back
    pub fn perform<F>(future: F) -> Self
    where
        F: Future<Output = Message> + Send + 'static,
    {
        Self {
            futures: vec![future.map(Some).boxed()],
        }
    }

    /// Run a future for its side effect only
    pub fn run<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            futures: vec![future.map(|()| None).boxed()],
        }
    }

    /// Like `perform`, but cancellable through the returned handle
    pub fn abortable<F>(future: F) -> (Self, AbortHandle)
    where
        F: Future<Output = Message> + Send + 'static,
    {
        let (future, handle) = abortable(future);
        let task = Self {
            futures: vec![future.map(Result::ok).boxed()],
        };
        (task, handle)
    }

    /// Deliver `message` after `delay`, cancellable
    pub fn delay(delay: Duration, message: Message) -> (Self, AbortHandle) {
        Self::abortable(async move {
            tokio::time::sleep(delay).await;
            message
        })
    }

    /// Combine several tasks
    pub fn batch(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            futures: tasks.into_iter().flat_map(|t| t.futures).collect(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.futures.is_empty()
    }

    pub(crate) fn into_futures(self) -> Vec<BoxFuture<'static, Option<Message>>> {
        self.futures
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("futures", &self.futures.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_delay_delivers_message() {
        let (task, _handle) = Task::delay(Duration::from_secs(1), Message::Stop);
        let mut futures = task.into_futures();
        assert_eq!(futures.len(), 1);
        let output = futures.remove(0).await;
        assert!(matches!(output, Some(Message::Stop)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_delay_yields_nothing() {
        let (task, handle) = Task::delay(Duration::from_secs(1), Message::Stop);
        handle.abort();
        let mut futures = task.into_futures();
        assert!(futures.remove(0).await.is_none());
    }

    #[test]
    fn test_batch_flattens() {
        let task = Task::batch([
            Task::none(),
            Task::run(async {}),
            Task::perform(async { Message::Start }),
        ]);
        assert_eq!(task.into_futures().len(), 2);
        assert!(Task::none().is_none());
    }
}
