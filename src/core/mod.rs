//! Core types and traits for the worker pool

pub mod error;
pub mod failure;
pub mod handle;
pub mod task;

pub use error::{PoolError, Result};
pub use failure::{FailedTask, FailurePolicy, TaskFailure};
pub use handle::TaskHandle;
pub use task::{BoxedTask, ClosureTask, SharedClosureTask, Task};
