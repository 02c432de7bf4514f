//! State shared between a pool handle and its workers

use crate::core::failure::FailureBin;
use crate::core::{BoxedTask, FailurePolicy, PoolError, Result};
use crate::observe::PoolLogger;
use crate::pool::config::PoolConfig;
use crate::pool::state::{AtomicPoolState, PoolState};
use crate::queue::TaskQueue;
use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Pool-wide task and worker counters.
///
/// Each counter is updated independently, so a reader combining several of
/// them sees an eventually consistent picture. A task is counted as
/// submitted before any worker can run it, so a reader that loads
/// `completed` and `failed` before `submitted` never sees more finished
/// tasks than submitted ones.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) submitted: CachePadded<AtomicU64>,
    pub(crate) completed: CachePadded<AtomicU64>,
    pub(crate) failed: CachePadded<AtomicU64>,
    pub(crate) discarded: CachePadded<AtomicU64>,
    pub(crate) detached: CachePadded<AtomicU64>,
    /// Workers that are neither retiring nor dead
    pub(crate) live: CachePadded<AtomicUsize>,
    /// Workers currently running a task
    pub(crate) busy: CachePadded<AtomicUsize>,
}

impl Counters {
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::AcqRel);
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Acquire)
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

pub(crate) struct Shared {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) policy: FailurePolicy,
    pub(crate) wake_fanout_cap: usize,
    pub(crate) logger: Arc<dyn PoolLogger>,
    pub(crate) queue: Mutex<TaskQueue>,
    /// Paired with `queue`; signalled on submissions, resume, retire and stop
    pub(crate) task_available: Condvar,
    pub(crate) state: AtomicPoolState,
    pub(crate) counters: Counters,
    pub(crate) failures: FailureBin,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state.load())
            .field("counters", &self.counters)
            .finish()
    }
}

impl Shared {
    pub(crate) fn new(config: &PoolConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: config.thread_name_prefix.clone(),
            policy: config.failure_policy,
            wake_fanout_cap: config.wake_fanout_cap,
            logger: Arc::clone(config.logger()),
            queue: Mutex::new(TaskQueue::new()),
            task_available: Condvar::new(),
            state: AtomicPoolState::new(PoolState::Uninitialized),
            counters: Counters::default(),
            failures: FailureBin::new(),
        }
    }

    pub(crate) fn lock_queue(&self) -> MutexGuard<'_, TaskQueue> {
        self.queue.lock()
    }

    /// Moves to `next` and returns the previous state.
    ///
    /// Taking the guard ties every transition to the queue lock.
    pub(crate) fn transition(&self, _queue: &MutexGuard<'_, TaskQueue>, next: PoolState) -> PoolState {
        self.state.swap(next)
    }

    /// Reports a transition to the logger. Call without holding the queue lock.
    pub(crate) fn announce(&self, from: PoolState, to: PoolState) {
        if from != to {
            self.logger.state_changed(&self.name, from, to);
        }
    }

    /// Rejects submissions once the pool is stopping.
    pub(crate) fn check_accepting(&self, _queue: &MutexGuard<'_, TaskQueue>) -> Result<()> {
        let state = self.state.load();
        if state.is_stopping() {
            return Err(PoolError::stopping(&self.name, state));
        }
        Ok(())
    }

    /// Enqueues one task and counts it as submitted.
    ///
    /// Returns the queue length after the push.
    pub(crate) fn enqueue_one(&self, task: BoxedTask) -> Result<usize> {
        let mut queue = self.lock_queue();
        self.check_accepting(&queue)?;
        queue.push(task);
        Counters::add(&self.counters.submitted, 1);
        Ok(queue.len())
    }

    /// Enqueues tasks and counts them as submitted.
    ///
    /// Returns the queue length after the push.
    pub(crate) fn enqueue<I>(&self, tasks: I) -> Result<usize>
    where
        I: IntoIterator<Item = BoxedTask>,
    {
        let mut queue = self.lock_queue();
        self.check_accepting(&queue)?;
        let added = queue.push_batch(tasks);
        Counters::add(&self.counters.submitted, added);
        Ok(queue.len())
    }

    /// Wakes up to `count` waiting workers.
    ///
    /// Requests for more than half of the live workers broadcast instead.
    pub(crate) fn wake(&self, count: usize) {
        if count == 0 {
            return;
        }
        let threshold = (self.counters.live() / 2).max(1);
        if count > threshold {
            self.task_available.notify_all();
        } else {
            self.wake_some(count);
        }
    }

    /// Wakes exactly `count` waiting workers, if there are that many.
    pub(crate) fn wake_some(&self, count: usize) {
        for _ in 0..count {
            self.task_available.notify_one();
        }
    }

    pub(crate) fn wake_all(&self) {
        self.task_available.notify_all();
    }
}
