//! Bookkeeping of a pool's worker threads

use crate::core::Result;
use crate::pool::shared::Shared;
use crate::pool::worker::{Worker, WorkerExit, WorkerStatSnapshot};
use std::sync::Arc;

/// Workers owned by a pool.
///
/// `active` holds workers counted by the pool, oldest first. Workers that
/// were retired or died from a task failure move to `retiring` until they
/// are joined.
#[derive(Debug, Default)]
pub(crate) struct Roster {
    active: Vec<Worker>,
    retiring: Vec<Worker>,
    /// Failure exits of workers joined before teardown
    failed_exits: Vec<(usize, WorkerExit)>,
    next_id: usize,
}

impl Roster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn active_len(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn retiring_len(&self) -> usize {
        self.retiring.len()
    }

    /// Spawn one worker and add it to the active set.
    pub(crate) fn spawn(
        &mut self,
        shared: &Arc<Shared>,
        prefix: &str,
        stack_size: Option<usize>,
    ) -> Result<()> {
        let worker = Worker::spawn(self.next_id, shared, prefix, stack_size)?;
        self.next_id += 1;
        self.active.push(worker);
        Ok(())
    }

    /// Move workers that died from a task failure out of the active set.
    pub(crate) fn prune_dead(&mut self) -> usize {
        let (dead, alive): (Vec<Worker>, Vec<Worker>) =
            self.active.drain(..).partition(Worker::is_dead);
        self.active = alive;
        let pruned = dead.len();
        self.retiring.extend(dead);
        pruned
    }

    /// Join retiring workers whose thread already ended and return how many
    /// were joined. Failure exits are kept for [`take_failed_exits`](Self::take_failed_exits).
    pub(crate) fn reap_finished(&mut self) -> usize {
        let (finished, running): (Vec<Worker>, Vec<Worker>) =
            self.retiring.drain(..).partition(Worker::is_finished);
        self.retiring = running;

        let reaped = finished.len();
        for worker in finished {
            let id = worker.id();
            let exit = worker.join();
            if !exit.is_success() {
                self.failed_exits.push((id, exit));
            }
        }
        reaped
    }

    pub(crate) fn take_failed_exits(&mut self) -> Vec<(usize, WorkerExit)> {
        std::mem::take(&mut self.failed_exits)
    }

    /// Retire the `count` most recently spawned workers.
    ///
    /// Must be called with the queue lock held; the caller broadcasts on the
    /// condition variable after releasing it.
    pub(crate) fn retire_newest(&mut self, count: usize, shared: &Shared) {
        let keep = self.active.len().saturating_sub(count);
        for worker in self.active.drain(keep..) {
            worker.retire(&shared.counters);
            self.retiring.push(worker);
        }
    }

    /// Remove every worker, active ones first.
    pub(crate) fn take_all(&mut self) -> Vec<Worker> {
        let mut all: Vec<Worker> = self.active.drain(..).collect();
        all.append(&mut self.retiring);
        all
    }

    pub(crate) fn snapshots(&self) -> Vec<WorkerStatSnapshot> {
        self.active
            .iter()
            .chain(self.retiring.iter())
            .map(Worker::snapshot)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailurePolicy;
    use crate::observe::NoopLogger;
    use crate::pool::config::PoolConfig;
    use crate::pool::state::PoolState;
    use std::thread;
    use std::time::{Duration, Instant};

    fn running_shared() -> Arc<Shared> {
        let config = PoolConfig::new(1)
            .with_failure_policy(FailurePolicy::Contain)
            .with_logger(Arc::new(NoopLogger));
        let shared = Arc::new(Shared::new(&config));
        {
            let queue = shared.lock_queue();
            shared.transition(&queue, PoolState::Running);
        }
        shared
    }

    fn stop(shared: &Shared) {
        {
            let queue = shared.lock_queue();
            shared.transition(&queue, PoolState::StoppingImmediate);
        }
        shared.wake_all();
    }

    #[test]
    fn test_spawn_assigns_sequential_ids() {
        let shared = running_shared();
        let mut roster = Roster::new();
        for _ in 0..3 {
            roster
                .spawn(&shared, "worker", None)
                .expect("Failed to spawn worker");
        }

        let ids: Vec<usize> = roster.snapshots().iter().map(|s| s.worker_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(shared.counters.live(), 3);

        stop(&shared);
        for worker in roster.take_all() {
            assert_eq!(worker.join(), WorkerExit::Stopped);
        }
    }

    #[test]
    fn test_retire_newest_then_reap() {
        let shared = running_shared();
        let mut roster = Roster::new();
        for _ in 0..4 {
            roster
                .spawn(&shared, "worker", None)
                .expect("Failed to spawn worker");
        }

        {
            let _queue = shared.lock_queue();
            roster.retire_newest(2, &shared);
        }
        shared.wake_all();

        assert_eq!(roster.active_len(), 2);
        assert_eq!(roster.retiring_len(), 2);
        assert_eq!(shared.counters.live(), 2);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut reaped = 0;
        while reaped < 2 && Instant::now() < deadline {
            reaped += roster.reap_finished();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(reaped, 2);
        assert_eq!(roster.retiring_len(), 0);
        assert!(roster.take_failed_exits().is_empty());

        let ids: Vec<usize> = roster.snapshots().iter().map(|s| s.worker_id).collect();
        assert_eq!(ids, vec![0, 1]);

        stop(&shared);
        assert_eq!(roster.take_all().len(), 2);
    }
}
