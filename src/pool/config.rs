//! Pool configuration

use crate::core::{FailurePolicy, PoolError, Result};
use crate::observe::{LogSink, PoolLogger};
use std::sync::Arc;

/// Upper bound on workers per pool unless configured otherwise
pub const DEFAULT_MAX_WORKERS: usize = 254;

/// Default number of workers woken by a multi-submission
pub const DEFAULT_WAKE_FANOUT_CAP: usize = 3;

/// Configuration for a worker pool
#[derive(Clone)]
pub struct PoolConfig {
    /// Number of workers spawned by [`WorkerPool::with_config`](crate::WorkerPool::with_config)
    /// (0 = number of CPUs)
    pub num_threads: usize,
    /// Thread name prefix, also used as the pool name
    pub thread_name_prefix: String,
    /// What a worker does when a task fails.
    /// Default: [`FailurePolicy::Contain`]
    pub failure_policy: FailurePolicy,
    /// Maximum number of workers woken by a single
    /// [`submit_many`](crate::WorkerPool::submit_many) call.
    /// Default: 3
    ///
    /// Workers that find more queued work wake further workers themselves,
    /// so this only limits the initial burst of wakeups.
    pub wake_fanout_cap: usize,
    /// Largest worker count accepted by `initialize`, `resize` and `detach`.
    /// Default: 254
    pub max_workers: usize,
    /// Stack size for worker threads (None = platform default)
    pub stack_size: Option<usize>,
    logger: Arc<dyn PoolLogger>,
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("num_threads", &self.num_threads)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("failure_policy", &self.failure_policy)
            .field("wake_fanout_cap", &self.wake_fanout_cap)
            .field("max_workers", &self.max_workers)
            .field("stack_size", &self.stack_size)
            .field("logger", &"<logger>")
            .finish()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: default_thread_count(),
            thread_name_prefix: "worker".to_string(),
            failure_policy: FailurePolicy::default(),
            wake_fanout_cap: DEFAULT_WAKE_FANOUT_CAP,
            max_workers: DEFAULT_MAX_WORKERS,
            stack_size: None,
            logger: Arc::new(LogSink),
        }
    }
}

fn default_thread_count() -> usize {
    num_cpus::get().clamp(1, DEFAULT_MAX_WORKERS)
}

impl PoolConfig {
    /// Create a new configuration with specified number of threads
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: if num_threads == 0 {
                default_thread_count()
            } else {
                num_threads
            },
            ..Default::default()
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the failure policy
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Shorthand for `with_failure_policy(FailurePolicy::Propagate)`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn propagate_failures(self) -> Self {
        self.with_failure_policy(FailurePolicy::Propagate)
    }

    /// Set how many workers a multi-submission wakes at most
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_wake_fanout_cap(mut self, cap: usize) -> Self {
        self.wake_fanout_cap = cap;
        self
    }

    /// Set the largest accepted worker count
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the worker thread stack size in bytes
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Install the event sink.
    ///
    /// Defaults to [`LogSink`]; pass [`NoopLogger`](crate::NoopLogger) to
    /// silence the pool entirely.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_logger(mut self, logger: Arc<dyn PoolLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// The installed event sink
    pub fn logger(&self) -> &Arc<dyn PoolLogger> {
        &self.logger
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(PoolError::invalid_config(
                "max_workers",
                "Maximum worker count must be greater than 0",
            ));
        }
        if self.num_threads > self.max_workers {
            return Err(PoolError::invalid_config(
                "num_threads",
                format!(
                    "{} threads exceeds the maximum of {}",
                    self.num_threads, self.max_workers
                ),
            ));
        }
        if self.wake_fanout_cap == 0 {
            return Err(PoolError::invalid_config(
                "wake_fanout_cap",
                "Wake fan-out cap must be greater than 0",
            ));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(PoolError::invalid_config(
                "thread_name_prefix",
                "Thread names cannot contain NUL bytes",
            ));
        }
        if self.stack_size == Some(0) {
            return Err(PoolError::invalid_config(
                "stack_size",
                "Stack size must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::NoopLogger;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert!(config.num_threads >= 1);
        assert_eq!(config.thread_name_prefix, "worker");
        assert_eq!(config.failure_policy, FailurePolicy::Contain);
        assert_eq!(config.wake_fanout_cap, 3);
        assert_eq!(config.max_workers, 254);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threads_means_cpu_count() {
        let config = PoolConfig::new(0);
        assert_eq!(config.num_threads, default_thread_count());
    }

    #[test]
    fn test_builder_methods() {
        let config = PoolConfig::new(3)
            .with_thread_name_prefix("io")
            .propagate_failures()
            .with_wake_fanout_cap(5)
            .with_max_workers(16)
            .with_stack_size(256 * 1024)
            .with_logger(Arc::new(NoopLogger));

        assert_eq!(config.num_threads, 3);
        assert_eq!(config.thread_name_prefix, "io");
        assert_eq!(config.failure_policy, FailurePolicy::Propagate);
        assert_eq!(config.wake_fanout_cap, 5);
        assert_eq!(config.max_workers, 16);
        assert_eq!(config.stack_size, Some(256 * 1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let too_many = PoolConfig::new(10).with_max_workers(4);
        assert!(matches!(
            too_many.validate(),
            Err(PoolError::InvalidConfig { ref parameter, .. }) if parameter == "num_threads"
        ));

        let no_fanout = PoolConfig::new(1).with_wake_fanout_cap(0);
        assert!(matches!(
            no_fanout.validate(),
            Err(PoolError::InvalidConfig { ref parameter, .. }) if parameter == "wake_fanout_cap"
        ));

        let bad_name = PoolConfig::new(1).with_thread_name_prefix("a\0b");
        assert!(bad_name.validate().is_err());
    }

    #[test]
    fn test_debug_hides_logger() {
        let rendered = format!("{:?}", PoolConfig::new(2));
        assert!(rendered.contains("num_threads: 2"));
        assert!(rendered.contains("<logger>"));
    }
}
