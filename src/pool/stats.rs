//! Pool-level statistics snapshot

use crate::core::{PoolError, Result};
use crate::pool::state::PoolState;
use crate::queue::QueueEpoch;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Point-in-time view of a pool.
///
/// Counters are read one after another without a common lock, so a
/// snapshot taken while tasks run may be off by the tasks that finished
/// during the read.
#[derive(Clone, Debug, Serialize)]
pub struct PoolStats {
    /// Pool identity
    pub pool_id: Uuid,
    /// Pool name
    pub name: String,
    /// Lifecycle state
    pub state: PoolState,
    /// Queue instance receiving submissions
    pub receiving: QueueEpoch,
    /// Live, non-retiring workers
    pub worker_count: usize,
    /// Live workers not currently running a task
    pub idle_workers: usize,
    /// Retired or dead workers not yet joined
    pub retiring_workers: usize,
    /// Tasks waiting in either queue instance
    pub queue_length: usize,
    /// Tasks accepted
    pub submitted: u64,
    /// Tasks that ran to completion
    pub completed: u64,
    /// Tasks that returned an error or panicked
    pub failed: u64,
    /// Tasks dropped without running
    pub discarded: u64,
    /// Tasks handed to detached pools
    pub detached: u64,
    /// Failure records waiting to be drained
    pub contained_failures: usize,
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
}

impl PoolStats {
    /// Tasks accepted but not yet accounted for as finished, dropped or
    /// handed off. Includes queued and running tasks.
    pub fn outstanding(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.failed + self.discarded + self.detached)
    }

    /// Render the snapshot as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PoolError::other(format!("Failed to serialize pool stats: {}", e)))
    }
}
