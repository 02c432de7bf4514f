//! Worker pool, its workers and lifecycle

mod config;
mod detach;
mod roster;
mod shared;
mod state;
mod stats;
mod worker;
mod worker_pool;

pub use config::{PoolConfig, DEFAULT_MAX_WORKERS, DEFAULT_WAKE_FANOUT_CAP};
pub use detach::{DetachSummary, DetachedPool};
pub use state::PoolState;
pub use stats::PoolStats;
pub use worker::{WorkerExit, WorkerStatSnapshot};
pub use worker_pool::WorkerPool;
