//! Error types for the worker pool

use crate::pool::PoolState;

/// Result type for worker pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in the worker pool
///
/// Control operations (`pause`, `resize`, `detach`, ...) report rejection
/// through this type instead of panicking. Task authors return it from their
/// closures, and result handles hand it back to the caller.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool was already initialized
    #[error("Worker pool '{pool_name}' is already initialized with {worker_count} workers")]
    AlreadyInitialized {
        /// Name of the worker pool
        pool_name: String,
        /// Number of live workers
        worker_count: usize,
    },

    /// The operation needs an initialized pool
    #[error("Worker pool '{pool_name}' is not initialized")]
    NotInitialized {
        /// Name of the worker pool
        pool_name: String,
    },

    /// The pool entered a terminal stopping state
    #[error("Worker pool '{pool_name}' is stopping ({state})")]
    Stopping {
        /// Name of the worker pool
        pool_name: String,
        /// State the pool was in when the operation was rejected
        state: PoolState,
    },

    /// The requested state change is not allowed from the current state
    #[error("Cannot {operation} worker pool in state {state}")]
    InvalidTransition {
        /// Operation that was attempted
        operation: &'static str,
        /// State the pool was in
        state: PoolState,
    },

    /// Requested worker count is out of range
    #[error("Invalid worker count {requested}: {message}")]
    InvalidWorkerCount {
        /// Requested number of workers
        requested: usize,
        /// Why the count was rejected
        message: String,
    },

    /// Nothing queued to hand off
    #[error("Worker pool '{pool_name}' has no queued tasks to detach")]
    EmptyQueue {
        /// Name of the worker pool
        pool_name: String,
    },

    /// Failed to spawn a worker thread
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// ID of the worker that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{thread_id}: {message}")]
    JoinError {
        /// ID of the worker that failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// A task returned an error
    #[error("Task '{task}' failed: {message}")]
    TaskFailed {
        /// Name of the failed task
        task: String,
        /// Error message
        message: String,
    },

    /// A task panicked
    #[error("Task '{task}' panicked: {message}")]
    TaskPanicked {
        /// Name of the panicked task
        task: String,
        /// Panic message
        message: String,
    },

    /// The task was dropped before it could run
    #[error("Task {task_id} was dropped before producing a result")]
    TaskAbandoned {
        /// ID of the abandoned task
        task_id: u64,
    },

    /// Waiting for a task result timed out
    #[error("Timed out after {timeout_ms}ms waiting for task {task_id}")]
    ResultTimeout {
        /// ID of the awaited task
        task_id: u64,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Create an already initialized error
    pub fn already_initialized(pool_name: impl Into<String>, worker_count: usize) -> Self {
        PoolError::AlreadyInitialized {
            pool_name: pool_name.into(),
            worker_count,
        }
    }

    /// Create a not initialized error
    pub fn not_initialized(pool_name: impl Into<String>) -> Self {
        PoolError::NotInitialized {
            pool_name: pool_name.into(),
        }
    }

    /// Create a stopping error
    pub fn stopping(pool_name: impl Into<String>, state: PoolState) -> Self {
        PoolError::Stopping {
            pool_name: pool_name.into(),
            state,
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(operation: &'static str, state: PoolState) -> Self {
        PoolError::InvalidTransition { operation, state }
    }

    /// Create an invalid worker count error
    pub fn invalid_worker_count(requested: usize, message: impl Into<String>) -> Self {
        PoolError::InvalidWorkerCount {
            requested,
            message: message.into(),
        }
    }

    /// Create an empty queue error
    pub fn empty_queue(pool_name: impl Into<String>) -> Self {
        PoolError::EmptyQueue {
            pool_name: pool_name.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(thread_id: usize, message: impl Into<String>) -> Self {
        PoolError::SpawnError {
            thread_id,
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        PoolError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        PoolError::JoinError {
            thread_id,
            message: message.into(),
        }
    }

    /// Create a task failed error
    pub fn task_failed(task: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::TaskFailed {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Create a task panicked error
    pub fn task_panicked(task: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::TaskPanicked {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Create a task abandoned error
    pub fn task_abandoned(task_id: u64) -> Self {
        PoolError::TaskAbandoned { task_id }
    }

    /// Create a result timeout error
    pub fn result_timeout(task_id: u64, timeout_ms: u64) -> Self {
        PoolError::ResultTimeout {
            task_id,
            timeout_ms,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PoolError::Other(msg.into())
    }

    /// Returns true if the error means the pool refused a control or
    /// submission request (as opposed to a task or thread failure).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PoolError::AlreadyInitialized { .. }
                | PoolError::NotInitialized { .. }
                | PoolError::Stopping { .. }
                | PoolError::InvalidTransition { .. }
                | PoolError::InvalidWorkerCount { .. }
                | PoolError::EmptyQueue { .. }
        )
    }
}
