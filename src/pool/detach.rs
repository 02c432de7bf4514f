//! Pools split off by [`WorkerPool::detach`]

use crate::core::handle::TaskHandle;
use crate::core::{BoxedTask, FailedTask, PoolError, Result};
use crate::pool::config::PoolConfig;
use crate::pool::worker_pool::WorkerPool;
use serde::Serialize;
use std::collections::VecDeque;
use std::thread;
use uuid::Uuid;

/// Outcome of a detached pool after it drained
#[derive(Clone, Debug, Serialize)]
pub struct DetachSummary {
    /// Identity of the detached pool
    pub pool_id: Uuid,
    /// Tasks moved over from the originating pool
    pub handed_off: usize,
    /// Tasks accepted in total, including any submitted to the detached pool directly
    pub submitted: u64,
    /// Tasks that ran to completion
    pub completed: u64,
    /// Tasks that returned an error or panicked
    pub failed: u64,
    /// Failures recorded under containment
    pub failures: Vec<FailedTask>,
    /// False if a worker ended through a task failure
    pub clean_shutdown: bool,
}

/// Owned handle to a pool created by [`WorkerPool::detach`]
///
/// Dropping the handle drains the detached pool and joins its workers, like
/// dropping any [`WorkerPool`]. Use [`reap_in_background`](Self::reap_in_background)
/// to do that without blocking the caller.
#[derive(Debug)]
pub struct DetachedPool {
    pool: WorkerPool,
    handed_off: usize,
}

impl DetachedPool {
    /// Start a pool with `num_workers` workers and feed it `tasks`.
    ///
    /// On failure the tasks are given back untouched.
    pub(crate) fn launch(
        config: PoolConfig,
        num_workers: usize,
        tasks: VecDeque<BoxedTask>,
    ) -> std::result::Result<Self, (PoolError, VecDeque<BoxedTask>)> {
        let pool = match WorkerPool::new(config) {
            Ok(pool) => pool,
            Err(e) => return Err((e, tasks)),
        };
        if let Err(e) = pool.initialize(num_workers) {
            return Err((e, tasks));
        }

        let handed_off = pool.adopt(tasks);
        Ok(Self { pool, handed_off })
    }

    /// The detached pool; it can be inspected, resized or fed more tasks
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Number of tasks moved over from the originating pool
    pub fn handed_off(&self) -> usize {
        self.handed_off
    }

    /// Wait until the detached pool drained and its workers exited
    pub fn join(self) -> DetachSummary {
        let clean_shutdown = self.pool.shutdown().is_ok();
        DetachSummary {
            pool_id: self.pool.id(),
            handed_off: self.handed_off,
            submitted: self.pool.submitted_count(),
            completed: self.pool.completed_count(),
            failed: self.pool.failed_count(),
            failures: self.pool.drain_failed_tasks(),
            clean_shutdown,
        }
    }

    /// Join on a dedicated reaper thread
    ///
    /// The returned handle yields the summary once the pool drained.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Other` naming the reaper thread if it cannot be
    /// created. The detached pool is then drained on the calling thread
    /// before returning.
    pub fn reap_in_background(self) -> Result<TaskHandle<DetachSummary>> {
        let (handle, sender) = TaskHandle::channel();
        let name = format!("{}-reaper", self.pool.name());

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || sender.send(Ok(self.join())))
            .map_err(|e| reaper_spawn_failed(&name, e))?;

        Ok(handle)
    }
}

fn reaper_spawn_failed(thread_name: &str, source: std::io::Error) -> PoolError {
    PoolError::other(format!(
        "Cannot create reaper thread '{}': {}",
        thread_name, source
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClosureTask, FailurePolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn tasks(counter: &Arc<AtomicUsize>, count: usize) -> VecDeque<BoxedTask> {
        (0..count)
            .map(|_| {
                let counter = Arc::clone(counter);
                Box::new(ClosureTask::new(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                })) as BoxedTask
            })
            .collect()
    }

    #[test]
    fn test_launch_runs_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let detached = DetachedPool::launch(PoolConfig::new(1), 2, tasks(&counter, 5))
            .unwrap_or_else(|(e, _)| panic!("launch failed: {}", e));

        assert_eq!(detached.handed_off(), 5);
        let summary = detached.join();
        assert_eq!(summary.submitted, 5);
        assert_eq!(summary.completed, 5);
        assert_eq!(summary.failed, 0);
        assert!(summary.clean_shutdown);
        assert_eq!(counter.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_launch_failure_returns_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let config = PoolConfig::new(1).with_max_workers(2);

        let result = DetachedPool::launch(config, 3, tasks(&counter, 4));
        match result {
            Err((PoolError::InvalidWorkerCount { requested: 3, .. }, returned)) => {
                assert_eq!(returned.len(), 4)
            }
            other => panic!("expected InvalidWorkerCount, got {:?}", other.map(|_| ())),
        }
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_reaper_spawn_error_names_thread() {
        let io_err = std::io::Error::new(std::io::ErrorKind::WouldBlock, "no threads left");
        let err = reaper_spawn_failed("batch-detached-reaper", io_err);

        assert!(!matches!(err, PoolError::SpawnError { .. }));
        assert_eq!(
            err.to_string(),
            "Cannot create reaper thread 'batch-detached-reaper': no threads left"
        );
    }

    #[test]
    fn test_summary_collects_contained_failures() {
        let mut queued: VecDeque<BoxedTask> = VecDeque::new();
        queued.push_back(Box::new(ClosureTask::with_name(
            || Err(PoolError::other("corrupt row")),
            "import",
        )));
        let config = PoolConfig::new(1).with_failure_policy(FailurePolicy::Contain);

        let summary = DetachedPool::launch(config, 1, queued)
            .unwrap_or_else(|(e, _)| panic!("launch failed: {}", e))
            .join();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].task_name, "import");

        let json = serde_json::to_value(&summary).expect("summary serializes");
        assert_eq!(json["failed"], 1);
    }
}
