//! Worker pool implementation

use crate::core::handle::{ResultTask, TaskHandle};
use crate::core::{
    BoxedTask, ClosureTask, FailedTask, PoolError, Result, SharedClosureTask, Task,
};
use crate::pool::config::PoolConfig;
use crate::pool::detach::DetachedPool;
use crate::pool::roster::Roster;
use crate::pool::shared::{Counters, Shared};
use crate::pool::state::PoolState;
use crate::pool::stats::PoolStats;
use crate::pool::worker::WorkerStatSnapshot;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A resizable pool of worker threads draining one FIFO task queue
///
/// # Lifecycle
///
/// A pool created with [`WorkerPool::new`] starts `Uninitialized`: it
/// accepts submissions but runs nothing until [`initialize`](Self::initialize)
/// spawns its workers. [`with_threads`](Self::with_threads) and
/// [`with_config`](Self::with_config) do both steps at once.
///
/// A running pool can be paused and resumed, resized, and finally stopped
/// either by dropping its queue ([`stop_immediate`](Self::stop_immediate)) or
/// by draining it ([`stop_when_drained`](Self::stop_when_drained)). Stopping
/// is irreversible.
///
/// # Teardown
///
/// Dropping the pool (or calling [`shutdown`](Self::shutdown)) stops it the
/// drained way and joins every worker, so all accepted tasks run unless the
/// pool was stopped immediately.
///
/// # Example
///
/// ```rust
/// use rust_worker_pool::prelude::*;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// # fn main() -> Result<()> {
/// let pool = WorkerPool::with_threads(4)?;
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// pool.pause()?;
/// for _ in 0..8 {
///     let counter = Arc::clone(&counter);
///     pool.execute(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     })?;
/// }
/// assert_eq!(pool.queue_length(), 8);
///
/// pool.resume()?;
/// pool.shutdown()?;
/// assert_eq!(counter.load(Ordering::Relaxed), 8);
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    config: PoolConfig,
    shared: Arc<Shared>,
    roster: RwLock<Roster>,
    default_workers: AtomicUsize,
    teardown: Mutex<()>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.id)
            .field("config", &self.config)
            .field("state", &self.shared.state.load())
            .field("worker_count", &self.shared.counters.live())
            .field(
                "submitted",
                &Counters::get(&self.shared.counters.submitted),
            )
            .finish()
    }
}

impl WorkerPool {
    /// Create an uninitialized pool
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared::new(&config)),
            roster: RwLock::new(Roster::new()),
            default_workers: AtomicUsize::new(config.num_threads),
            teardown: Mutex::new(()),
            config,
        })
    }

    /// Create a running pool with specified number of workers (0 = number of CPUs)
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(num_threads))
    }

    /// Create a running pool with `config.num_threads` workers
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        let num_threads = config.num_threads;
        let pool = Self::new(config)?;
        pool.initialize(num_threads)?;
        Ok(pool)
    }

    /// Spawn `num_workers` workers and start dispatching
    ///
    /// Tasks submitted before this call run in submission order once the
    /// workers are up. `num_workers` becomes the count restored by
    /// [`reset_to_default_count`](Self::reset_to_default_count). Zero is
    /// allowed: tasks then wait until a [`resize`](Self::resize).
    ///
    /// # Errors
    ///
    /// - `AlreadyInitialized` if called twice; existing workers are untouched
    /// - `Stopping` if the pool was stopped before being initialized
    /// - `InvalidWorkerCount` if `num_workers` exceeds `max_workers`
    /// - `SpawnError` if a thread cannot be created
    pub fn initialize(&self, num_workers: usize) -> Result<()> {
        self.check_worker_count(num_workers)?;

        let mut roster = self.roster.write();
        let previous = {
            let queue = self.shared.lock_queue();
            match self.shared.state.load() {
                PoolState::Uninitialized => self.shared.transition(&queue, PoolState::Running),
                state if state.is_stopping() => {
                    return Err(PoolError::stopping(&self.shared.name, state))
                }
                _ => {
                    return Err(PoolError::already_initialized(
                        &self.shared.name,
                        self.shared.counters.live(),
                    ))
                }
            }
        };
        self.shared.announce(previous, PoolState::Running);
        self.default_workers.store(num_workers, Ordering::Release);

        for _ in 0..num_workers {
            roster.spawn(
                &self.shared,
                &self.config.thread_name_prefix,
                self.config.stack_size,
            )?;
        }

        #[cfg(feature = "tracing")]
        crate::observe::metrics::record_pool_start(&self.shared.name, num_workers);

        Ok(())
    }

    /// Submit a task to the pool
    ///
    /// Accepted before initialization and while paused; rejected with
    /// `PoolError::Stopping` once the pool is stopping.
    pub fn submit<T: Task + 'static>(&self, task: T) -> Result<()> {
        self.submit_boxed(Box::new(task))
    }

    /// Submit an already boxed task
    pub fn submit_boxed(&self, task: BoxedTask) -> Result<()> {
        let _depth = self.shared.enqueue_one(task)?;
        self.shared.wake_some(1);

        #[cfg(feature = "tracing")]
        crate::observe::metrics::record_submission(1, _depth);

        Ok(())
    }

    /// Execute a closure in the pool
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit(ClosureTask::new(f))
    }

    /// Submit `count` runs of the same closure as one atomic batch
    ///
    /// Equivalent to `count` calls of [`execute`](Self::execute), except that
    /// at most `wake_fanout_cap` workers are woken up front. `count == 0`
    /// does nothing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rust_worker_pool::prelude::*;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<()> {
    /// let pool = WorkerPool::with_threads(4)?;
    /// let hits = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&hits);
    ///
    /// pool.submit_many(16, move || {
    ///     counter.fetch_add(1, Ordering::Relaxed);
    ///     Ok(())
    /// })?;
    /// pool.shutdown()?;
    /// assert_eq!(hits.load(Ordering::Relaxed), 16);
    /// # Ok(())
    /// # }
    /// ```
    pub fn submit_many<F>(&self, count: usize, f: F) -> Result<()>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        if count == 0 {
            return Ok(());
        }
        let tasks = SharedClosureTask::copies(f, count)
            .into_iter()
            .map(|task| Box::new(task) as BoxedTask);
        let _depth = self.shared.enqueue(tasks)?;
        self.wake_for_batch(count);

        #[cfg(feature = "tracing")]
        crate::observe::metrics::record_submission(count, _depth);

        Ok(())
    }

    /// Submit a closure and get a handle to its result
    ///
    /// The handle yields the closure's value, its error, or
    /// `PoolError::TaskPanicked`. The pool counts such a task as completed
    /// either way; failures travel through the handle instead.
    pub fn submit_with_result<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (handle, sender) = TaskHandle::channel();
        self.submit(ResultTask::new(f, sender))?;
        Ok(handle)
    }

    /// Submit `count` runs of the same closure, one handle per run
    pub fn submit_many_with_result<F, T>(&self, count: usize, f: F) -> Result<Vec<TaskHandle<T>>>
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        if count == 0 {
            return Ok(Vec::new());
        }
        let f = Arc::new(f);
        let mut handles = Vec::with_capacity(count);
        let mut tasks: Vec<BoxedTask> = Vec::with_capacity(count);
        for _ in 0..count {
            let (handle, sender) = TaskHandle::channel();
            let f = Arc::clone(&f);
            tasks.push(Box::new(ResultTask::new(move || (*f)(), sender)));
            handles.push(handle);
        }
        let _depth = self.shared.enqueue(tasks)?;
        self.wake_for_batch(count);

        #[cfg(feature = "tracing")]
        crate::observe::metrics::record_submission(count, _depth);

        Ok(handles)
    }

    fn wake_for_batch(&self, count: usize) {
        let wake = count
            .min(self.shared.wake_fanout_cap)
            .min(self.shared.counters.live());
        self.shared.wake_some(wake);
    }

    /// Stop dequeuing tasks
    ///
    /// Tasks already running finish; queued and newly submitted tasks wait
    /// in order until [`resume`](Self::resume). Pausing a paused pool is a
    /// no-op.
    pub fn pause(&self) -> Result<()> {
        let previous = {
            let mut queue = self.shared.lock_queue();
            match self.shared.state.load() {
                PoolState::Running => {
                    queue.pause();
                    self.shared.transition(&queue, PoolState::Paused)
                }
                PoolState::Paused => return Ok(()),
                state => return Err(self.rejection("pause", state)),
            }
        };
        self.shared.announce(previous, PoolState::Paused);
        Ok(())
    }

    /// Resume dispatching after [`pause`](Self::pause)
    ///
    /// Wakes workers in proportion to the number of buffered tasks.
    /// Resuming a running pool is a no-op.
    pub fn resume(&self) -> Result<()> {
        let (previous, ready) = {
            let mut queue = self.shared.lock_queue();
            match self.shared.state.load() {
                PoolState::Paused => {
                    let ready = queue.resume();
                    (self.shared.transition(&queue, PoolState::Running), ready)
                }
                PoolState::Running => return Ok(()),
                state => return Err(self.rejection("resume", state)),
            }
        };
        self.shared.wake(ready);
        self.shared.announce(previous, PoolState::Running);
        Ok(())
    }

    /// Drop every queued task and let workers exit after their current task
    ///
    /// Accepted in every state; calling it again returns 0. Result handles of
    /// dropped tasks report `PoolError::TaskAbandoned`.
    ///
    /// Returns the number of tasks dropped.
    pub fn stop_immediate(&self) -> usize {
        let (previous, dropped) = {
            let mut queue = self.shared.lock_queue();
            if self.shared.state.load() == PoolState::StoppingImmediate {
                return 0;
            }
            let dropped = queue.drain_all();
            (
                self.shared.transition(&queue, PoolState::StoppingImmediate),
                dropped,
            )
        };
        self.shared.wake_all();

        let count = dropped.len();
        Counters::add(&self.shared.counters.discarded, count);
        drop(dropped);

        self.shared.announce(previous, PoolState::StoppingImmediate);
        count
    }

    /// Stop accepting tasks and let workers exit once the queue is empty
    ///
    /// A paused pool is resumed first so buffered tasks run too. Calling it
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before [`initialize`](Self::initialize)
    /// - `Stopping` after [`stop_immediate`](Self::stop_immediate)
    pub fn stop_when_drained(&self) -> Result<()> {
        let previous = {
            let mut queue = self.shared.lock_queue();
            match self.shared.state.load() {
                PoolState::Running | PoolState::Paused => {
                    queue.resume();
                    self.shared
                        .transition(&queue, PoolState::StoppingOnComplete)
                }
                PoolState::StoppingOnComplete => return Ok(()),
                state => return Err(self.rejection("stop", state)),
            }
        };
        self.shared.wake_all();
        self.shared
            .announce(previous, PoolState::StoppingOnComplete);
        Ok(())
    }

    /// Change the number of workers
    ///
    /// Workers that died from a task failure are replaced. Shrinking retires
    /// the most recently spawned workers; each finishes its current task
    /// first. Queued tasks are never lost. Retired workers are joined by
    /// later resizes and at teardown.
    ///
    /// # Errors
    ///
    /// - `InvalidWorkerCount` if `num_workers` exceeds `max_workers`
    /// - `NotInitialized` or `Stopping` outside `Running`/`Paused`
    /// - `SpawnError` if a thread cannot be created
    pub fn resize(&self, num_workers: usize) -> Result<()> {
        self.check_worker_count(num_workers)?;

        let mut roster = self.roster.write();
        let state = self.shared.state.load();
        if !state.is_active() {
            return Err(self.rejection("resize", state));
        }

        roster.prune_dead();
        roster.reap_finished();

        let current = roster.active_len();
        if num_workers > current {
            for _ in current..num_workers {
                roster.spawn(
                    &self.shared,
                    &self.config.thread_name_prefix,
                    self.config.stack_size,
                )?;
            }
        } else if num_workers < current {
            {
                let _queue = self.shared.lock_queue();
                roster.retire_newest(current - num_workers, &self.shared);
            }
            self.shared.wake_all();
        }

        if num_workers != current {
            self.shared
                .logger
                .resized(&self.shared.name, current, num_workers);
        }
        Ok(())
    }

    /// Resize back to the count given to [`initialize`](Self::initialize)
    pub fn reset_to_default_count(&self) -> Result<()> {
        self.resize(self.default_worker_count())
    }

    /// Move every queued task into a new pool with `num_workers` workers
    ///
    /// The hand-off is atomic: tasks submitted afterwards stay here. The new
    /// pool uses this pool's configuration and a `-detached` name suffix.
    ///
    /// # Errors
    ///
    /// - `InvalidWorkerCount` if `num_workers` is 0 or above `max_workers`
    /// - `Stopping` once this pool is stopping
    /// - `EmptyQueue` if there is nothing to hand off
    /// - `SpawnError` if the new pool cannot start; the tasks stay here
    ///
    /// # Example
    ///
    /// ```rust
    /// use rust_worker_pool::prelude::*;
    ///
    /// # fn main() -> Result<()> {
    /// let pool = WorkerPool::with_threads(1)?;
    /// pool.pause()?;
    /// for _ in 0..4 {
    ///     pool.execute(|| Ok(()))?;
    /// }
    ///
    /// let detached = pool.detach(2)?;
    /// assert_eq!(pool.queue_length(), 0);
    ///
    /// let summary = detached.join();
    /// assert_eq!(summary.completed, 4);
    /// # Ok(())
    /// # }
    /// ```
    pub fn detach(&self, num_workers: usize) -> Result<DetachedPool> {
        if num_workers == 0 {
            return Err(PoolError::invalid_worker_count(
                0,
                "a detached pool needs at least one worker",
            ));
        }
        self.check_worker_count(num_workers)?;

        let tasks = {
            let mut queue = self.shared.lock_queue();
            self.shared.check_accepting(&queue)?;
            // only the receiving instance can hold tasks
            if queue.is_empty() {
                return Err(PoolError::empty_queue(&self.shared.name));
            }
            queue.take_receiving()
        };

        let handed_off = tasks.len();
        let config = self
            .config
            .clone()
            .with_thread_name_prefix(format!("{}-detached", self.config.thread_name_prefix));

        match DetachedPool::launch(config, num_workers, tasks) {
            Ok(detached) => {
                Counters::add(&self.shared.counters.detached, handed_off);
                self.shared
                    .logger
                    .detached(&self.shared.name, handed_off, num_workers);
                Ok(detached)
            }
            Err((error, tasks)) => {
                self.restore(tasks);
                Err(error)
            }
        }
    }

    /// Take tasks from a detaching pool without state checks.
    pub(crate) fn adopt(&self, tasks: VecDeque<BoxedTask>) -> usize {
        let count = {
            let mut queue = self.shared.lock_queue();
            let count = queue.push_batch(tasks);
            Counters::add(&self.shared.counters.submitted, count);
            count
        };
        self.shared.wake(count);
        count
    }

    /// Put back tasks a failed detach took out.
    fn restore(&self, tasks: VecDeque<BoxedTask>) {
        let count = tasks.len();
        let dropped = {
            let mut queue = self.shared.lock_queue();
            if self.shared.state.load() == PoolState::StoppingImmediate {
                Some(tasks)
            } else {
                queue.restore_front(tasks);
                None
            }
        };
        match dropped {
            Some(tasks) => {
                Counters::add(&self.shared.counters.discarded, tasks.len());
            }
            None => self.shared.wake(count),
        }
    }

    /// Stop the pool the drained way and wait for every worker
    ///
    /// Safe to call more than once; [`Drop`] calls it too. A pool that was
    /// never initialized has no workers: its queued tasks are dropped and
    /// counted as discarded.
    ///
    /// # Errors
    ///
    /// Returns `JoinError` naming the first worker that ended through a task
    /// failure (only possible with
    /// [`FailurePolicy::Propagate`](crate::FailurePolicy::Propagate)).
    pub fn shutdown(&self) -> Result<()> {
        let _teardown = self.teardown.lock();

        let previous = {
            let mut queue = self.shared.lock_queue();
            match self.shared.state.load() {
                PoolState::Running | PoolState::Paused => {
                    queue.resume();
                    Some(self.shared.transition(&queue, PoolState::StoppingOnComplete))
                }
                PoolState::Uninitialized => {
                    Some(self.shared.transition(&queue, PoolState::StoppingOnComplete))
                }
                _ => None,
            }
        };
        self.shared.wake_all();
        if let Some(previous) = previous {
            self.shared
                .announce(previous, PoolState::StoppingOnComplete);
        }

        let (workers, mut exits) = {
            let mut roster = self.roster.write();
            (roster.take_all(), roster.take_failed_exits())
        };
        for worker in workers {
            let id = worker.id();
            exits.push((id, worker.join()));
        }
        let first_failure = exits
            .into_iter()
            .find(|(_, exit)| !exit.is_success())
            .map(|(id, exit)| PoolError::join(id, format!("worker exited: {}", exit)));

        let leftover = self.shared.lock_queue().drain_all();
        Counters::add(&self.shared.counters.discarded, leftover.len());
        drop(leftover);

        #[cfg(feature = "tracing")]
        crate::observe::metrics::record_pool_shutdown(
            &self.shared.name,
            self.completed_count(),
            self.failed_count(),
        );

        match first_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn check_worker_count(&self, num_workers: usize) -> Result<()> {
        if num_workers > self.config.max_workers {
            return Err(PoolError::invalid_worker_count(
                num_workers,
                format!("exceeds the maximum of {}", self.config.max_workers),
            ));
        }
        Ok(())
    }

    fn rejection(&self, operation: &'static str, state: PoolState) -> PoolError {
        match state {
            PoolState::Uninitialized => PoolError::not_initialized(&self.shared.name),
            state if state.is_stopping() => PoolError::stopping(&self.shared.name, state),
            state => PoolError::invalid_transition(operation, state),
        }
    }

    /// Unique identity of this pool
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Pool name (the thread name prefix)
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Configuration the pool was created with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        self.shared.state.load()
    }

    /// Check if the pool is dispatching tasks
    pub fn is_running(&self) -> bool {
        self.state() == PoolState::Running
    }

    /// Live workers, not counting retiring or dead ones
    pub fn worker_count(&self) -> usize {
        self.shared.counters.live()
    }

    /// Live workers not currently running a task (approximate)
    pub fn idle_worker_estimate(&self) -> usize {
        self.shared
            .counters
            .live()
            .saturating_sub(self.shared.counters.busy.load(Ordering::Acquire))
    }

    /// Worker count given to [`initialize`](Self::initialize)
    pub fn default_worker_count(&self) -> usize {
        self.default_workers.load(Ordering::Acquire)
    }

    /// Tasks waiting to run, including those buffered by a pause
    pub fn queue_length(&self) -> usize {
        self.shared.lock_queue().len()
    }

    /// Get total number of tasks accepted
    pub fn submitted_count(&self) -> u64 {
        Counters::get(&self.shared.counters.submitted)
    }

    /// Get total number of tasks that ran to completion
    pub fn completed_count(&self) -> u64 {
        Counters::get(&self.shared.counters.completed)
    }

    /// Get total number of tasks that returned an error or panicked
    pub fn failed_count(&self) -> u64 {
        Counters::get(&self.shared.counters.failed)
    }

    /// Get total number of tasks dropped without running
    pub fn discarded_count(&self) -> u64 {
        Counters::get(&self.shared.counters.discarded)
    }

    /// Get total number of tasks handed to detached pools
    pub fn detached_count(&self) -> u64 {
        Counters::get(&self.shared.counters.detached)
    }

    /// Remove and return the failures recorded under
    /// [`FailurePolicy::Contain`](crate::FailurePolicy::Contain), oldest first
    pub fn drain_failed_tasks(&self) -> Vec<FailedTask> {
        self.shared.failures.drain()
    }

    /// Get statistics for all workers not yet joined
    pub fn worker_stats(&self) -> Vec<WorkerStatSnapshot> {
        self.roster.read().snapshots()
    }

    /// Take a snapshot of the pool's state and counters
    pub fn stats(&self) -> PoolStats {
        // finished counts before submitted, so completed + failed <= submitted
        let completed = self.completed_count();
        let failed = self.failed_count();
        let retiring_workers = self.roster.read().retiring_len();
        let (queue_length, receiving) = {
            let queue = self.shared.lock_queue();
            (queue.len(), queue.receiving())
        };

        PoolStats {
            pool_id: self.shared.id,
            name: self.shared.name.clone(),
            state: self.state(),
            receiving,
            worker_count: self.worker_count(),
            idle_workers: self.idle_worker_estimate(),
            retiring_workers,
            queue_length,
            submitted: self.submitted_count(),
            completed,
            failed,
            discarded: self.discarded_count(),
            detached: self.detached_count(),
            contained_failures: self.shared.failures.len(),
            captured_at: Utc::now(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!(
                target: crate::observe::LOG_TARGET,
                "pool '{}' shut down with errors: {}",
                self.shared.name,
                e
            );
        }
    }
}
