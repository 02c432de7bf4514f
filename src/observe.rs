//! Observability hooks.
//!
//! Every pool reports lifecycle events to a [`PoolLogger`]. The default sink,
//! [`LogSink`], forwards them to the [`log`] facade under the
//! `rust_worker_pool` target, so nothing is printed unless the application
//! installs a logger (for example `env_logger`).
//!
//! With the `tracing` feature enabled, workers additionally open spans per
//! worker and per task and emit the trace events in [`metrics`].
//!
//! # Example
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicUsize);
//!
//! impl PoolLogger for FailureCounter {
//!     fn task_failed(&self, _pool: &str, _failed: &FailedTask) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let counter = Arc::new(FailureCounter::default());
//! let config = PoolConfig::new(1).with_logger(counter.clone());
//! let pool = WorkerPool::with_config(config)?;
//!
//! pool.execute(|| Err(PoolError::other("bad record")))?;
//! pool.shutdown()?;
//! assert_eq!(counter.0.load(Ordering::Relaxed), 1);
//! # Ok(())
//! # }
//! ```

use crate::core::FailedTask;
use crate::pool::{PoolState, WorkerExit};

/// Log target used by [`LogSink`]
pub const LOG_TARGET: &str = "rust_worker_pool";

/// Receiver of pool lifecycle events
///
/// All methods default to doing nothing, so implementors only override what
/// they care about. Hooks run on pool and worker threads, sometimes while a
/// worker is unwinding; they must not call back into the pool that reports
/// them.
pub trait PoolLogger: Send + Sync {
    /// The pool moved from one lifecycle state to another
    fn state_changed(&self, _pool: &str, _from: PoolState, _to: PoolState) {}

    /// A worker thread entered its dispatch loop
    fn worker_started(&self, _pool: &str, _worker_id: usize) {}

    /// A worker thread left its dispatch loop
    fn worker_exited(&self, _pool: &str, _worker_id: usize, _exit: WorkerExit) {}

    /// A task returned an error or panicked
    fn task_failed(&self, _pool: &str, _failed: &FailedTask) {}

    /// The worker count target changed
    fn resized(&self, _pool: &str, _from: usize, _to: usize) {}

    /// Queued tasks were handed to a new pool
    fn detached(&self, _pool: &str, _tasks: usize, _workers: usize) {}
}

/// Forwards pool events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PoolLogger for LogSink {
    fn state_changed(&self, pool: &str, from: PoolState, to: PoolState) {
        log::info!(target: LOG_TARGET, "pool '{}': {} -> {}", pool, from, to);
    }

    fn worker_started(&self, pool: &str, worker_id: usize) {
        log::debug!(target: LOG_TARGET, "pool '{}': worker {} started", pool, worker_id);
    }

    fn worker_exited(&self, pool: &str, worker_id: usize, exit: WorkerExit) {
        if exit.is_success() {
            log::debug!(
                target: LOG_TARGET,
                "pool '{}': worker {} exited ({})",
                pool,
                worker_id,
                exit
            );
        } else {
            log::warn!(
                target: LOG_TARGET,
                "pool '{}': worker {} exited ({})",
                pool,
                worker_id,
                exit
            );
        }
    }

    fn task_failed(&self, pool: &str, failed: &FailedTask) {
        if failed.failure.is_panic() {
            log::error!(
                target: LOG_TARGET,
                "pool '{}': task '{}' on worker {} {}",
                pool,
                failed.task_name,
                failed.worker_id,
                failed.failure
            );
        } else {
            log::warn!(
                target: LOG_TARGET,
                "pool '{}': task '{}' on worker {} {}",
                pool,
                failed.task_name,
                failed.worker_id,
                failed.failure
            );
        }
    }

    fn resized(&self, pool: &str, from: usize, to: usize) {
        log::info!(target: LOG_TARGET, "pool '{}': resized {} -> {} workers", pool, from, to);
    }

    fn detached(&self, pool: &str, tasks: usize, workers: usize) {
        log::info!(
            target: LOG_TARGET,
            "pool '{}': detached {} tasks to a pool of {} workers",
            pool,
            tasks,
            workers
        );
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl PoolLogger for NoopLogger {}

/// Metrics recording functions for observability.
///
/// These functions emit tracing events that can be consumed by
/// metrics collection systems like Prometheus via tracing-opentelemetry.
#[cfg(feature = "tracing")]
pub mod metrics {
    use std::time::Duration;

    /// Records a task submission event.
    #[inline]
    pub fn record_submission(count: usize, queue_depth: usize) {
        tracing::trace!(
            counter.tasks_submitted = count as u64,
            gauge.queue_depth = queue_depth as i64,
            "task submitted"
        );
    }

    /// Records task completion with timing.
    #[inline]
    pub fn record_completion(duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            tracing::trace!(
                counter.tasks_completed = 1,
                histogram.task_duration_ms = duration_ms,
                "task completed successfully"
            );
        } else {
            tracing::trace!(
                counter.tasks_failed = 1,
                histogram.task_duration_ms = duration_ms,
                "task failed"
            );
        }
    }

    /// Records a task panic event.
    #[inline]
    pub fn record_panic(duration: Duration) {
        tracing::trace!(
            counter.tasks_panicked = 1,
            histogram.task_duration_ms = duration.as_millis() as u64,
            "task panicked"
        );
    }

    /// Records worker becoming busy.
    #[inline]
    pub fn record_worker_busy(worker_id: usize) {
        tracing::trace!(gauge.workers_busy = 1, worker_id = worker_id, "worker busy");
    }

    /// Records worker becoming idle.
    #[inline]
    pub fn record_worker_idle(worker_id: usize) {
        tracing::trace!(
            gauge.workers_busy = -1i64,
            worker_id = worker_id,
            "worker idle"
        );
    }

    /// Records pool startup.
    #[inline]
    pub fn record_pool_start(pool: &str, num_workers: usize) {
        tracing::info!(pool = pool, workers = num_workers, "worker pool started");
    }

    /// Records pool shutdown.
    #[inline]
    pub fn record_pool_shutdown(pool: &str, tasks_completed: u64, tasks_failed: u64) {
        tracing::info!(
            pool = pool,
            tasks_completed = tasks_completed,
            tasks_failed = tasks_failed,
            "worker pool shutdown complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskFailure;
    use parking_lot::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PoolLogger for Recorder {
        fn state_changed(&self, pool: &str, from: PoolState, to: PoolState) {
            self.events.lock().push(format!("{}:{}->{}", pool, from, to));
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        let recorder = Recorder::default();
        let failed = FailedTask::new(Uuid::nil(), 0, "t", TaskFailure::Error("e".into()));

        recorder.worker_started("p", 0);
        recorder.worker_exited("p", 0, WorkerExit::Drained);
        recorder.task_failed("p", &failed);
        recorder.resized("p", 1, 2);
        recorder.detached("p", 3, 1);
        assert!(recorder.events.lock().is_empty());

        recorder.state_changed("p", PoolState::Running, PoolState::Paused);
        assert_eq!(recorder.events.lock().as_slice(), ["p:Running->Paused"]);
    }

    #[test]
    fn test_log_sink_accepts_all_events() {
        let sink = LogSink;
        let failed = FailedTask::new(Uuid::nil(), 1, "t", TaskFailure::Panic("boom".into()));

        sink.state_changed("p", PoolState::Uninitialized, PoolState::Running);
        sink.worker_started("p", 1);
        sink.worker_exited("p", 1, WorkerExit::Panicked);
        sink.task_failed("p", &failed);
        sink.resized("p", 4, 2);
        sink.detached("p", 10, 2);
        NoopLogger.task_failed("p", &failed);
    }
}
