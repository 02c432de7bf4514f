//! Convenient re-exports for common types and traits

pub use crate::core::{
    BoxedTask, ClosureTask, FailedTask, FailurePolicy, PoolError, Result, Task, TaskFailure,
    TaskHandle,
};
pub use crate::observe::{LogSink, NoopLogger, PoolLogger};
pub use crate::pool::{
    DetachSummary, DetachedPool, PoolConfig, PoolState, PoolStats, WorkerExit, WorkerPool,
};
