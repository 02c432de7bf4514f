//! Result handles for tasks submitted with
//! [`WorkerPool::submit_with_result`](crate::WorkerPool::submit_with_result)
//!
//! A [`TaskHandle`] is the receiving half of a one-shot channel. The worker
//! that runs the task sends the outcome, so waiting on a handle never depends
//! on submission order. If the task is dropped without running (for example
//! by [`WorkerPool::stop_immediate`](crate::WorkerPool::stop_immediate)) the
//! channel disconnects and the handle reports [`PoolError::TaskAbandoned`].
//!
//! # Example
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = WorkerPool::with_threads(2)?;
//! let handle = pool.submit_with_result(|| Ok(6 * 7))?;
//! assert_eq!(handle.join()?, 42);
//! # Ok(())
//! # }
//! ```

use crate::core::error::{PoolError, Result};
use crate::core::failure::panic_message;
use crate::core::task::Task;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Generates a unique task ID
fn next_task_id() -> u64 {
    NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle to the eventual result of a task
#[derive(Debug)]
pub struct TaskHandle<T> {
    task_id: u64,
    receiver: Receiver<Result<T>>,
    /// Dead once the sending half is gone
    sender_alive: Weak<()>,
}

impl<T> TaskHandle<T> {
    /// Creates a connected handle and the sender its task reports to.
    pub(crate) fn channel() -> (Self, ResultSender<T>) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let task_id = next_task_id();
        let alive = Arc::new(());
        let handle = Self {
            task_id,
            receiver,
            sender_alive: Arc::downgrade(&alive),
        };
        (
            handle,
            ResultSender {
                task_id,
                sender,
                _alive: alive,
            },
        )
    }

    /// Unique ID of the task behind this handle
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    /// Returns true once [`try_join`](Self::try_join) would return `Some`:
    /// a result is ready, or the task was dropped without running
    pub fn is_finished(&self) -> bool {
        !self.receiver.is_empty() || self.sender_alive.strong_count() == 0
    }

    /// Block until the task has run and return its outcome
    ///
    /// # Errors
    ///
    /// - the task's own error, if it returned `Err`
    /// - `PoolError::TaskPanicked` if it panicked
    /// - `PoolError::TaskAbandoned` if it was dropped without running
    pub fn join(self) -> Result<T> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(PoolError::task_abandoned(self.task_id)))
    }

    /// Wait up to `timeout` for the outcome
    ///
    /// On timeout the handle stays usable. Once an outcome has been returned
    /// the handle is spent and further calls report `TaskAbandoned`.
    pub fn join_timeout(&self, timeout: Duration) -> Result<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(PoolError::result_timeout(
                self.task_id,
                timeout.as_millis() as u64,
            )),
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::task_abandoned(self.task_id)),
        }
    }

    /// Collect the outcome if it is ready, without blocking
    pub fn try_join(&self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PoolError::task_abandoned(self.task_id))),
        }
    }
}

#[cfg(feature = "async")]
impl<T: Send + 'static> TaskHandle<T> {
    /// Await the outcome from async code
    ///
    /// The blocking wait runs on tokio's blocking thread pool, so a runtime
    /// must be active.
    pub async fn join_async(self) -> Result<T> {
        let task_id = self.task_id;
        tokio::task::spawn_blocking(move || self.join())
            .await
            .unwrap_or_else(|e| Err(wait_failed(task_id, e)))
    }
}

/// Error for a result wait that broke down on the waiting side
#[cfg(any(feature = "async", test))]
fn wait_failed(task_id: u64, reason: impl std::fmt::Display) -> PoolError {
    PoolError::other(format!(
        "Waiting for the result of task {} failed: {}",
        task_id, reason
    ))
}

/// Sending half paired with a [`TaskHandle`]
#[derive(Debug)]
pub(crate) struct ResultSender<T> {
    task_id: u64,
    sender: Sender<Result<T>>,
    _alive: Arc<()>,
}

impl<T> ResultSender<T> {
    pub(crate) fn task_id(&self) -> u64 {
        self.task_id
    }

    /// Deliver the outcome; a dropped handle is not an error.
    pub(crate) fn send(self, outcome: Result<T>) {
        let _ = self.sender.send(outcome);
    }
}

/// A task whose return value is delivered to a [`TaskHandle`]
///
/// Failures are delivered to the handle rather than reported to the pool,
/// so from the pool's point of view a `ResultTask` always completes.
pub(crate) struct ResultTask<F, T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    closure: Option<F>,
    sender: Option<ResultSender<T>>,
}

impl<F, T> ResultTask<F, T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    pub(crate) fn new(closure: F, sender: ResultSender<T>) -> Self {
        Self {
            closure: Some(closure),
            sender: Some(sender),
        }
    }
}

impl<F, T> Task for ResultTask<F, T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    fn execute(&mut self) -> Result<()> {
        let (Some(closure), Some(sender)) = (self.closure.take(), self.sender.take()) else {
            return Err(PoolError::other(
                "ResultTask already executed - cannot execute twice",
            ));
        };

        let outcome = catch_unwind(AssertUnwindSafe(closure)).unwrap_or_else(|payload| {
            Err(PoolError::task_panicked(
                format!("ResultTask#{}", sender.task_id()),
                panic_message(payload.as_ref()),
            ))
        });
        sender.send(outcome);
        Ok(())
    }

    fn task_name(&self) -> &str {
        "ResultTask"
    }
}
