//! Task failure handling: the containment policy and the failure bin

use chrono::{DateTime, Utc};
use crossbeam_queue::SegQueue;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use uuid::Uuid;

/// What a worker does when a task fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum FailurePolicy {
    /// Record the failure in the pool's failure bin and keep the worker
    /// running. Only the failed task is lost.
    #[default]
    Contain,
    /// Let the failure end the worker that ran the task.
    ///
    /// A returned error stops the worker's dispatch loop; a panic unwinds
    /// the worker thread. The worker stops counting towards
    /// [`WorkerPool::worker_count`](crate::WorkerPool::worker_count) and is
    /// replaced only by a later [`resize`](crate::WorkerPool::resize).
    Propagate,
}

/// How a task failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TaskFailure {
    /// The task returned an error
    Error(String),
    /// The task panicked
    Panic(String),
}

impl TaskFailure {
    /// Failure message
    pub fn message(&self) -> &str {
        match self {
            TaskFailure::Error(msg) | TaskFailure::Panic(msg) => msg,
        }
    }

    /// Returns true for panics
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskFailure::Panic(_))
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Error(msg) => write!(f, "error: {}", msg),
            TaskFailure::Panic(msg) => write!(f, "panic: {}", msg),
        }
    }
}

/// Record of a task that failed while containment was enabled
#[derive(Clone, Debug, Serialize)]
pub struct FailedTask {
    /// Pool the task ran in
    pub pool_id: Uuid,
    /// Worker that ran the task
    pub worker_id: usize,
    /// Name reported by the task
    pub task_name: String,
    /// What went wrong
    pub failure: TaskFailure,
    /// When the failure was recorded
    pub failed_at: DateTime<Utc>,
}

impl FailedTask {
    pub(crate) fn new(
        pool_id: Uuid,
        worker_id: usize,
        task_name: impl Into<String>,
        failure: TaskFailure,
    ) -> Self {
        Self {
            pool_id,
            worker_id,
            task_name: task_name.into(),
            failure,
            failed_at: Utc::now(),
        }
    }
}

/// Unbounded lock-free collection of contained failures
#[derive(Debug, Default)]
pub(crate) struct FailureBin {
    entries: SegQueue<FailedTask>,
}

impl FailureBin {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, failed: FailedTask) {
        self.entries.push(failed);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes and returns everything recorded so far, oldest first.
    pub(crate) fn drain(&self) -> Vec<FailedTask> {
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some(failed) = self.entries.pop() {
            drained.push(failed);
        }
        drained
    }
}

/// Extracts a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
