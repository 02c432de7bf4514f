//! # Rust Worker Pool
//!
//! A resizable pool of worker threads draining one shared FIFO task queue.
//!
//! ## Features
//!
//! - **Lifecycle control**: pause and resume dispatching without losing tasks
//! - **Two ways to stop**: drop the queue immediately or drain it first
//! - **Dynamic resizing**: grow or shrink while tasks are queued
//! - **Result handles**: collect a task's value, error or panic from any thread
//! - **Failure containment**: failing tasks are recorded, workers keep going
//! - **Detach**: hand the current backlog to a separate pool
//! - **Thread Safety**: Built on parking_lot and crossbeam
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! // Create a pool with four running workers
//! let pool = WorkerPool::with_threads(4)?;
//!
//! // Submit tasks
//! for i in 0..10 {
//!     pool.execute(move || {
//!         println!("Task {} executing", i);
//!         Ok(())
//!     })?;
//! }
//!
//! // Drain the queue and join the workers
//! pool.shutdown()?;
//! assert_eq!(pool.completed_count(), 10);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pool Configuration
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let config = PoolConfig::new(8)
//!     .with_thread_name_prefix("ingest")
//!     .with_failure_policy(FailurePolicy::Contain)
//!     .with_wake_fanout_cap(4);
//!
//! let pool = WorkerPool::with_config(config)?;
//! assert_eq!(pool.worker_count(), 8);
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Tasks
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! struct Checksum {
//!     data: Vec<u8>,
//! }
//!
//! impl Task for Checksum {
//!     fn execute(&mut self) -> Result<()> {
//!         let sum: u32 = self.data.iter().map(|&b| u32::from(b)).sum();
//!         println!("checksum: {}", sum);
//!         Ok(())
//!     }
//!
//!     fn task_name(&self) -> &str {
//!         "Checksum"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! # let pool = WorkerPool::with_threads(2)?;
//! pool.submit(Checksum {
//!     data: b"payload".to_vec(),
//! })?;
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Resizing and Statistics
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = WorkerPool::with_threads(2)?;
//! pool.resize(6)?;
//! assert_eq!(pool.worker_count(), 6);
//!
//! pool.submit_many(10, || Ok(()))?;
//! pool.reset_to_default_count()?;
//! assert_eq!(pool.worker_count(), 2);
//!
//! pool.shutdown()?;
//! let stats = pool.stats();
//! println!("{}", stats.to_json()?);
//! assert_eq!(stats.completed, 10);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod observe;
pub mod pool;
pub mod prelude;
pub mod queue;

pub use core::{
    BoxedTask, ClosureTask, FailedTask, FailurePolicy, PoolError, Result, SharedClosureTask, Task,
    TaskFailure, TaskHandle,
};
pub use observe::{LogSink, NoopLogger, PoolLogger};
pub use pool::{
    DetachSummary, DetachedPool, PoolConfig, PoolState, PoolStats, WorkerExit,
    WorkerStatSnapshot, WorkerPool,
};
pub use queue::QueueEpoch;
