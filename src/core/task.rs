//! Task trait and closure adapters

use crate::core::error::{PoolError, Result};
use std::fmt;
use std::sync::Arc;

/// A unit of work executed by exactly one pool worker
///
/// A task fails when `execute` returns `Err` or panics. What happens next
/// depends on the pool's [`FailurePolicy`](crate::FailurePolicy).
pub trait Task: Send {
    /// Execute the task
    ///
    /// # Errors
    ///
    /// Returns an error if the task fails
    fn execute(&mut self) -> Result<()>;

    /// Get the task's name for diagnostics and failure records
    fn task_name(&self) -> &str {
        "Task"
    }
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.task_name())
    }
}

/// A boxed task that can be sent across threads
pub type BoxedTask = Box<dyn Task>;

/// Helper to create a task from a one-shot closure
pub struct ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    closure: Option<F>,
    name: String,
}

impl<F> ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    /// Create a new closure task
    pub fn new(closure: F) -> Self {
        Self {
            closure: Some(closure),
            name: "ClosureTask".to_string(),
        }
    }

    /// Create a new closure task with a custom name
    pub fn with_name<S: Into<String>>(closure: F, name: S) -> Self {
        Self {
            closure: Some(closure),
            name: name.into(),
        }
    }
}

impl<F> Task for ClosureTask<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn execute(&mut self) -> Result<()> {
        match self.closure.take() {
            Some(closure) => closure(),
            None => Err(PoolError::other(
                "ClosureTask already executed - cannot execute twice",
            )),
        }
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}

/// One copy of a closure submitted several times at once
///
/// All copies share the same closure through an `Arc`, so the closure runs
/// once per copy without being cloned.
pub struct SharedClosureTask<F>
where
    F: Fn() -> Result<()> + Send + Sync,
{
    closure: Arc<F>,
    executed: bool,
}

impl<F> SharedClosureTask<F>
where
    F: Fn() -> Result<()> + Send + Sync,
{
    /// Create `count` tasks that all run `closure`
    pub fn copies(closure: F, count: usize) -> Vec<Self> {
        let closure = Arc::new(closure);
        (0..count)
            .map(|_| Self {
                closure: Arc::clone(&closure),
                executed: false,
            })
            .collect()
    }
}

impl<F> Task for SharedClosureTask<F>
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn execute(&mut self) -> Result<()> {
        if self.executed {
            return Err(PoolError::other(
                "SharedClosureTask already executed - cannot execute twice",
            ));
        }
        self.executed = true;
        (self.closure)()
    }

    fn task_name(&self) -> &str {
        "SharedClosureTask"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_task() {
        let mut task = ClosureTask::new(|| Ok(()));

        assert_eq!(task.task_name(), "ClosureTask");
        assert!(task.execute().is_ok());
    }

    #[test]
    fn test_closure_task_runs_once() {
        let mut task = ClosureTask::new(|| Ok(()));
        task.execute().expect("first run succeeds");
        assert!(matches!(task.execute(), Err(PoolError::Other(_))));
    }

    #[test]
    fn test_closure_task_with_name() {
        let task = ClosureTask::with_name(|| Ok(()), "TestTask");
        assert_eq!(task.task_name(), "TestTask");
    }

    #[test]
    fn test_shared_closure_copies() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut copies = SharedClosureTask::copies(
            move || {
                counter_clone.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            4,
        );
        assert_eq!(copies.len(), 4);

        for task in copies.iter_mut() {
            task.execute().expect("copy should run");
        }
        assert_eq!(counter.load(Ordering::Relaxed), 4);
        assert!(copies[0].execute().is_err());
    }
}
