//! Task queue used by [`WorkerPool`](crate::WorkerPool).
//!
//! The pool keeps one [`TaskQueue`] behind its queue lock. The queue holds
//! two FIFO instances; the [`QueueEpoch`] says which one receives new
//! submissions. Pausing the pool swaps the instances so workers find nothing
//! to dequeue while submissions keep accumulating in order.

mod task_queue;

pub use task_queue::QueueEpoch;
pub(crate) use task_queue::TaskQueue;
