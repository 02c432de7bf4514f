//! Pool lifecycle state

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`WorkerPool`](crate::WorkerPool)
///
/// ```text
/// Uninitialized --initialize--> Running <--pause/resume--> Paused
///       |                          |                          |
///       |                          +---- stop_when_drained ---+--> StoppingOnComplete
///       |                          |                          |            |
///       +------------------------- +------ stop_immediate ----+------------+--> StoppingImmediate
/// ```
///
/// The two stopping states are terminal: nothing leads back to `Running`
/// or `Paused`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum PoolState {
    /// Created but no workers spawned yet; submissions are queued
    Uninitialized = 0,
    /// Workers dispatch tasks
    Running = 1,
    /// Submissions are buffered, no new task is dequeued
    Paused = 2,
    /// Queued tasks were dropped; workers exit after their current task
    StoppingImmediate = 3,
    /// Workers drain the queue, then exit
    StoppingOnComplete = 4,
}

impl PoolState {
    /// Returns true for the terminal stopping states
    pub fn is_stopping(self) -> bool {
        matches!(
            self,
            PoolState::StoppingImmediate | PoolState::StoppingOnComplete
        )
    }

    /// Returns true if the pool can be paused, resumed or resized
    pub fn is_active(self) -> bool {
        matches!(self, PoolState::Running | PoolState::Paused)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => PoolState::Uninitialized,
            1 => PoolState::Running,
            2 => PoolState::Paused,
            3 => PoolState::StoppingImmediate,
            _ => PoolState::StoppingOnComplete,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolState::Uninitialized => "Uninitialized",
            PoolState::Running => "Running",
            PoolState::Paused => "Paused",
            PoolState::StoppingImmediate => "StoppingImmediate",
            PoolState::StoppingOnComplete => "StoppingOnComplete",
        };
        f.write_str(name)
    }
}

/// Lock-free readable state cell.
///
/// Writers must hold the pool's queue lock so that a transition and the
/// queue operation that goes with it are seen together.
#[derive(Debug)]
pub(crate) struct AtomicPoolState(AtomicU8);

impl AtomicPoolState {
    pub(crate) fn new(state: PoolState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> PoolState {
        PoolState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Stores `next` and returns the previous state.
    pub(crate) fn swap(&self, next: PoolState) -> PoolState {
        PoolState::from_u8(self.0.swap(next as u8, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(PoolState::StoppingImmediate.is_stopping());
        assert!(PoolState::StoppingOnComplete.is_stopping());
        assert!(!PoolState::Paused.is_stopping());

        assert!(PoolState::Running.is_active());
        assert!(PoolState::Paused.is_active());
        assert!(!PoolState::Uninitialized.is_active());
        assert!(!PoolState::StoppingOnComplete.is_active());
    }

    #[test]
    fn test_atomic_state_roundtrip() {
        let cell = AtomicPoolState::new(PoolState::Uninitialized);
        for state in [
            PoolState::Running,
            PoolState::Paused,
            PoolState::StoppingOnComplete,
            PoolState::StoppingImmediate,
        ] {
            let previous = cell.load();
            assert_eq!(cell.swap(state), previous);
            assert_eq!(cell.load(), state);
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PoolState::Paused.to_string(), "Paused");
        assert_eq!(
            PoolState::StoppingOnComplete.to_string(),
            "StoppingOnComplete"
        );
    }
}
