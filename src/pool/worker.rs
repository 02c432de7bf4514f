//! Worker thread implementation

use crate::core::failure::{panic_message, TaskFailure};
use crate::core::{BoxedTask, FailedTask, FailurePolicy, PoolError, Result};
use crate::pool::shared::{Counters, Shared};
use crate::pool::state::PoolState;
use serde::Serialize;
use std::fmt;
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_panicked: AtomicU64,
    total_processing_time_us: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_panicked(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_processing_time(&self, microseconds: u64) {
        self.total_processing_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Average processing time per task in microseconds, failures included
    pub(crate) fn average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.tasks_completed.load(Ordering::Relaxed)
            + self.tasks_failed.load(Ordering::Relaxed)
            + self.tasks_panicked.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// Point-in-time copy of one worker's statistics
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkerStatSnapshot {
    /// Worker ID, unique within its pool
    pub worker_id: usize,
    /// True once the worker was retired by a resize or died from a task failure
    pub retiring: bool,
    /// Tasks that returned `Ok`
    pub tasks_completed: u64,
    /// Tasks that returned `Err`
    pub tasks_failed: u64,
    /// Tasks that panicked
    pub tasks_panicked: u64,
    /// Mean time spent per task in microseconds
    pub average_processing_time_us: f64,
}

/// Why a worker left its dispatch loop
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum WorkerExit {
    /// Retired by a resize
    Retired,
    /// The pool entered `StoppingImmediate`
    Stopped,
    /// The pool entered `StoppingOnComplete` and the queue ran empty
    Drained,
    /// A task returned an error under [`FailurePolicy::Propagate`]
    TaskFailed,
    /// A task panicked under [`FailurePolicy::Propagate`]
    Panicked,
}

impl WorkerExit {
    /// Returns true for the orderly exits
    pub fn is_success(self) -> bool {
        matches!(
            self,
            WorkerExit::Retired | WorkerExit::Stopped | WorkerExit::Drained
        )
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            WorkerExit::Retired => "retired",
            WorkerExit::Stopped => "stopped",
            WorkerExit::Drained => "drained",
            WorkerExit::TaskFailed => "task failed",
            WorkerExit::Panicked => "panicked",
        };
        f.write_str(reason)
    }
}

const ACTIVE: u8 = 0;
const RETIRING: u8 = 1;
const DEAD: u8 = 2;
const EXITED: u8 = 3;

/// Upper bound on how long dropping a running worker waits for its thread
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-worker control flags.
///
/// `status` decides who gives up the worker's slot in the live count:
/// whichever of `mark_retiring` and `mark_exited` wins the exchange.
#[derive(Debug)]
pub(crate) struct WorkerSignal {
    retire: AtomicBool,
    status: AtomicU8,
}

impl WorkerSignal {
    fn new() -> Self {
        Self {
            retire: AtomicBool::new(false),
            status: AtomicU8::new(ACTIVE),
        }
    }

    fn should_retire(&self) -> bool {
        self.retire.load(Ordering::Acquire)
    }

    fn mark_retiring(&self) -> bool {
        self.status
            .compare_exchange(ACTIVE, RETIRING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `DEAD` after a failure exit, `EXITED` after an orderly one.
    fn mark_exited(&self, exit: WorkerExit) -> bool {
        let next = if exit.is_success() { EXITED } else { DEAD };
        self.status
            .compare_exchange(ACTIVE, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn status(&self) -> u8 {
        self.status.load(Ordering::Acquire)
    }
}

/// A worker thread that runs the pool's dispatch loop
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<WorkerExit>>,
    stats: Arc<WorkerStats>,
    signal: Arc<WorkerSignal>,
    shared: Arc<Shared>,
}

impl Worker {
    /// Spawn a worker named `{prefix}-{id}` and count it as live
    pub(crate) fn spawn(
        id: usize,
        shared: &Arc<Shared>,
        prefix: &str,
        stack_size: Option<usize>,
    ) -> Result<Self> {
        let stats = Arc::new(WorkerStats::new());
        let signal = Arc::new(WorkerSignal::new());
        let dispatcher = Dispatcher {
            id,
            shared: Arc::clone(shared),
            signal: Arc::clone(&signal),
            stats: Arc::clone(&stats),
        };

        let mut builder = thread::Builder::new().name(format!("{}-{}", prefix, id));
        if let Some(bytes) = stack_size {
            builder = builder.stack_size(bytes);
        }

        shared.counters.live.fetch_add(1, Ordering::AcqRel);
        let thread = builder.spawn(move || dispatcher.run()).map_err(|e| {
            shared.counters.live.fetch_sub(1, Ordering::AcqRel);
            PoolError::spawn_with_source(id, "Cannot create worker thread", e)
        })?;

        Ok(Self {
            id,
            thread: Some(thread),
            stats,
            signal,
            shared: Arc::clone(shared),
        })
    }

    /// Get worker ID
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Ask the worker to exit after its current task.
    ///
    /// Must be called with the queue lock held, followed by a broadcast once
    /// the lock is released.
    pub(crate) fn retire(&self, counters: &Counters) {
        if self.signal.mark_retiring() {
            counters.live.fetch_sub(1, Ordering::AcqRel);
        }
        self.signal.retire.store(true, Ordering::Release);
    }

    /// True once the worker ended through a task failure
    pub(crate) fn is_dead(&self) -> bool {
        self.signal.status() == DEAD
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    pub(crate) fn snapshot(&self) -> WorkerStatSnapshot {
        WorkerStatSnapshot {
            worker_id: self.id,
            retiring: matches!(self.signal.status(), RETIRING | DEAD),
            tasks_completed: self.stats.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.stats.tasks_failed.load(Ordering::Relaxed),
            tasks_panicked: self.stats.tasks_panicked.load(Ordering::Relaxed),
            average_processing_time_us: self.stats.average_processing_time_us(),
        }
    }

    /// Join the worker thread.
    ///
    /// A thread that unwound reports [`WorkerExit::Panicked`].
    pub(crate) fn join(mut self) -> WorkerExit {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or(WorkerExit::Panicked),
            None => WorkerExit::Drained,
        }
    }
}

impl Drop for Worker {
    /// Retire a worker that is still running and join it, giving up after
    /// [`JOIN_TIMEOUT`].
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if !thread.is_finished() {
            self.retire(&self.shared.counters);
        }

        let start = Instant::now();
        loop {
            if thread.is_finished() {
                if thread.join().is_err() {
                    log::warn!(
                        target: crate::observe::LOG_TARGET,
                        "worker {} panicked before it was dropped",
                        self.id
                    );
                }
                break;
            }

            if start.elapsed() >= JOIN_TIMEOUT {
                log::warn!(
                    target: crate::observe::LOG_TARGET,
                    "worker {} did not finish within {}s of being dropped; thread leaked",
                    self.id,
                    JOIN_TIMEOUT.as_secs()
                );
                break;
            }

            // retire flag was set without the queue lock, so keep broadcasting
            self.shared.wake_all();
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Everything a worker thread owns
struct Dispatcher {
    id: usize,
    shared: Arc<Shared>,
    signal: Arc<WorkerSignal>,
    stats: Arc<WorkerStats>,
}

/// Runs the exit bookkeeping on every way out of the dispatch loop,
/// unwinding included.
struct ExitGuard<'a> {
    dispatcher: &'a Dispatcher,
    exit: WorkerExit,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let worker = self.dispatcher;
        let shared = &*worker.shared;
        if worker.signal.mark_exited(self.exit) {
            shared.counters.live.fetch_sub(1, Ordering::AcqRel);
        }
        if !self.exit.is_success() {
            shared.task_available.notify_one();
        }

        #[cfg(feature = "tracing")]
        debug!(exit = %self.exit, "worker shutting down");

        shared.logger.worker_exited(&shared.name, worker.id, self.exit);
    }
}

impl Dispatcher {
    fn run(self) -> WorkerExit {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", pool = %self.shared.name, id = self.id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        self.shared.logger.worker_started(&self.shared.name, self.id);

        let mut guard = ExitGuard {
            dispatcher: &self,
            exit: WorkerExit::Panicked,
        };
        let exit = self.dispatch();
        guard.exit = exit;
        exit
    }

    /// Main worker loop.
    ///
    /// The predicate is re-checked after every wake, in this order: retire
    /// signal, immediate stop, next task, drained stop.
    fn dispatch(&self) -> WorkerExit {
        let shared = &*self.shared;
        loop {
            let mut task = {
                let mut queue = shared.lock_queue();
                loop {
                    if self.signal.should_retire() {
                        // the wake that reached us may have been meant for a task
                        if queue.dispatchable() > 0 {
                            shared.task_available.notify_one();
                        }
                        return WorkerExit::Retired;
                    }
                    let state = shared.state.load();
                    if state == PoolState::StoppingImmediate {
                        return WorkerExit::Stopped;
                    }
                    if let Some((task, queued)) = queue.pop() {
                        if queued > 1 {
                            shared.task_available.notify_one();
                        }
                        break task;
                    }
                    if state == PoolState::StoppingOnComplete {
                        return WorkerExit::Drained;
                    }
                    shared.task_available.wait(&mut queue);
                }
            };

            if let Some(exit) = self.execute_task(&mut task) {
                return exit;
            }
        }
    }

    /// Execute a single task with panic protection.
    ///
    /// Returns the exit reason when the failure policy ends the worker.
    fn execute_task(&self, task: &mut BoxedTask) -> Option<WorkerExit> {
        let shared = &*self.shared;

        #[cfg(feature = "tracing")]
        let task_span = span!(Level::DEBUG, "task_execution", task_name = task.task_name());
        #[cfg(feature = "tracing")]
        let _task_guard = task_span.enter();

        shared.counters.busy.fetch_add(1, Ordering::AcqRel);
        #[cfg(feature = "tracing")]
        crate::observe::metrics::record_worker_busy(self.id);

        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| task.execute()));
        let elapsed = start.elapsed();
        self.stats.add_processing_time(elapsed.as_micros() as u64);

        let mut unwind = None;
        let exit = match outcome {
            Ok(Ok(())) => {
                self.stats.increment_completed();
                Counters::add(&shared.counters.completed, 1);
                #[cfg(feature = "tracing")]
                {
                    debug!(duration_ms = elapsed.as_millis() as u64, "task completed");
                    crate::observe::metrics::record_completion(elapsed, true);
                }
                None
            }
            Ok(Err(e)) => {
                self.stats.increment_failed();
                #[cfg(feature = "tracing")]
                {
                    tracing::warn!(
                        error = %e,
                        duration_ms = elapsed.as_millis() as u64,
                        "task failed"
                    );
                    crate::observe::metrics::record_completion(elapsed, false);
                }
                self.report_failure(task.task_name(), TaskFailure::Error(e.to_string()));
                match shared.policy {
                    FailurePolicy::Contain => None,
                    FailurePolicy::Propagate => Some(WorkerExit::TaskFailed),
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.stats.increment_panicked();
                #[cfg(feature = "tracing")]
                {
                    tracing::error!(
                        panic_message = %message,
                        duration_ms = elapsed.as_millis() as u64,
                        "task panicked"
                    );
                    crate::observe::metrics::record_panic(elapsed);
                }
                self.report_failure(task.task_name(), TaskFailure::Panic(message));
                if shared.policy == FailurePolicy::Propagate {
                    unwind = Some(payload);
                }
                None
            }
        };

        shared.counters.busy.fetch_sub(1, Ordering::AcqRel);
        #[cfg(feature = "tracing")]
        crate::observe::metrics::record_worker_idle(self.id);

        if let Some(payload) = unwind {
            panic::resume_unwind(payload);
        }
        exit
    }

    fn report_failure(&self, task_name: &str, failure: TaskFailure) {
        let shared = &*self.shared;
        let failed = FailedTask::new(shared.id, self.id, task_name, failure);
        shared.logger.task_failed(&shared.name, &failed);
        if shared.policy == FailurePolicy::Contain {
            shared.failures.record(failed);
        }
        Counters::add(&shared.counters.failed, 1);
    }
}
