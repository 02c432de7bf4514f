//! Two-epoch FIFO task queue.

use crate::core::BoxedTask;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::mem;

/// Which queue instance currently receives submissions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum QueueEpoch {
    /// Submissions go to the queue workers drain
    Active,
    /// Submissions are buffered until the pool resumes
    Paused,
}

/// FIFO task storage with an active and a paused instance.
///
/// Workers only ever dequeue from `pending`. Pausing swaps `pending` with the
/// (empty) `buffered` instance, which moves the not-yet-dequeued backlog out
/// of the workers' reach; submissions made while paused are appended behind
/// it. Resuming swaps back, so FIFO order across the pause is preserved.
///
/// Invariant: `buffered` is empty whenever the epoch is `Active`, and
/// `pending` is empty whenever the epoch is `Paused`.
///
/// Not synchronized; the pool guards it with its queue lock.
pub(crate) struct TaskQueue {
    pending: VecDeque<BoxedTask>,
    buffered: VecDeque<BoxedTask>,
    receiving: QueueEpoch,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending.len())
            .field("buffered", &self.buffered.len())
            .field("receiving", &self.receiving)
            .finish()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            buffered: VecDeque::new(),
            receiving: QueueEpoch::Active,
        }
    }

    fn receiving_mut(&mut self) -> &mut VecDeque<BoxedTask> {
        match self.receiving {
            QueueEpoch::Active => &mut self.pending,
            QueueEpoch::Paused => &mut self.buffered,
        }
    }

    /// Appends a task to the receiving queue.
    pub(crate) fn push(&mut self, task: BoxedTask) {
        self.receiving_mut().push_back(task);
    }

    /// Appends tasks to the receiving queue in iteration order and returns
    /// how many were added.
    pub(crate) fn push_batch<I>(&mut self, tasks: I) -> usize
    where
        I: IntoIterator<Item = BoxedTask>,
    {
        let queue = self.receiving_mut();
        let before = queue.len();
        queue.extend(tasks);
        queue.len() - before
    }

    /// Dequeues the oldest dispatchable task together with the number of
    /// dispatchable tasks there were before the dequeue.
    pub(crate) fn pop(&mut self) -> Option<(BoxedTask, usize)> {
        let queued = self.pending.len();
        self.pending.pop_front().map(|task| (task, queued))
    }

    /// Switches to the paused epoch. Returns false if already paused.
    pub(crate) fn pause(&mut self) -> bool {
        if self.receiving == QueueEpoch::Paused {
            return false;
        }
        debug_assert!(self.buffered.is_empty());
        mem::swap(&mut self.pending, &mut self.buffered);
        self.receiving = QueueEpoch::Paused;
        true
    }

    /// Switches back to the active epoch and returns the number of tasks
    /// that became dispatchable.
    pub(crate) fn resume(&mut self) -> usize {
        if self.receiving == QueueEpoch::Paused {
            debug_assert!(self.pending.is_empty());
            mem::swap(&mut self.pending, &mut self.buffered);
            self.receiving = QueueEpoch::Active;
        }
        self.pending.len()
    }

    /// Takes every task from the receiving queue, leaving it empty.
    pub(crate) fn take_receiving(&mut self) -> VecDeque<BoxedTask> {
        mem::take(self.receiving_mut())
    }

    /// Puts tasks back at the head of the receiving queue, ahead of anything
    /// submitted since they were taken.
    pub(crate) fn restore_front(&mut self, mut tasks: VecDeque<BoxedTask>) {
        let queue = self.receiving_mut();
        tasks.append(queue);
        *queue = tasks;
    }

    /// Removes every queued task from both instances.
    pub(crate) fn drain_all(&mut self) -> Vec<BoxedTask> {
        let mut drained: Vec<BoxedTask> = self.pending.drain(..).collect();
        drained.extend(self.buffered.drain(..));
        drained
    }

    /// Tasks waiting in either instance.
    pub(crate) fn len(&self) -> usize {
        self.pending.len() + self.buffered.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks workers may dequeue right now.
    pub(crate) fn dispatchable(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn receiving(&self) -> QueueEpoch {
        self.receiving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClosureTask, Task};

    fn named(name: &str) -> BoxedTask {
        Box::new(ClosureTask::with_name(|| Ok(()), name.to_string()))
    }

    fn pop_name(queue: &mut TaskQueue) -> Option<String> {
        queue.pop().map(|(task, _)| task.task_name().to_string())
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new();
        queue.push(named("a"));
        queue.push(named("b"));
        queue.push(named("c"));

        let (task, queued) = queue.pop().expect("task");
        assert_eq!(task.task_name(), "a");
        assert_eq!(queued, 3);
        assert_eq!(pop_name(&mut queue).as_deref(), Some("b"));
        assert_eq!(pop_name(&mut queue).as_deref(), Some("c"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_pause_hides_backlog_and_buffers() {
        let mut queue = TaskQueue::new();
        queue.push(named("before"));

        assert!(queue.pause());
        assert!(!queue.pause());
        assert_eq!(queue.receiving(), QueueEpoch::Paused);
        queue.push(named("during"));

        assert!(queue.pop().is_none());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dispatchable(), 0);

        assert_eq!(queue.resume(), 2);
        assert_eq!(queue.receiving(), QueueEpoch::Active);
        assert_eq!(pop_name(&mut queue).as_deref(), Some("before"));
        assert_eq!(pop_name(&mut queue).as_deref(), Some("during"));
    }

    #[test]
    fn test_resume_when_active_is_noop() {
        let mut queue = TaskQueue::new();
        queue.push(named("x"));
        assert_eq!(queue.resume(), 1);
        assert_eq!(queue.receiving(), QueueEpoch::Active);
    }

    #[test]
    fn test_take_and_restore_receiving() {
        let mut queue = TaskQueue::new();
        queue.push_batch(vec![named("a"), named("b")]);

        let taken = queue.take_receiving();
        assert_eq!(taken.len(), 2);
        assert!(queue.is_empty());

        queue.push(named("late"));
        queue.restore_front(taken);
        assert_eq!(pop_name(&mut queue).as_deref(), Some("a"));
        assert_eq!(pop_name(&mut queue).as_deref(), Some("b"));
        assert_eq!(pop_name(&mut queue).as_deref(), Some("late"));
    }

    #[test]
    fn test_take_receiving_while_paused() {
        let mut queue = TaskQueue::new();
        queue.push(named("a"));
        queue.pause();
        queue.push(named("b"));

        assert_eq!(queue.take_receiving().len(), 2);
        assert_eq!(queue.resume(), 0);
    }

    #[test]
    fn test_drain_all_empties_both_instances() {
        let mut queue = TaskQueue::new();
        queue.push(named("a"));
        queue.pause();
        queue.push(named("b"));

        assert_eq!(queue.drain_all().len(), 2);
        assert!(queue.is_empty());
    }
}
