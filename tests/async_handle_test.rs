//! Awaiting result handles from async code
#![cfg(feature = "async")]

use rust_worker_pool::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn test_join_async_value() {
    let pool = WorkerPool::with_threads(2).expect("Failed to create pool");
    let handle = pool
        .submit_with_result(|| {
            std::thread::sleep(Duration::from_millis(5));
            Ok(String::from("ready"))
        })
        .expect("Failed to submit task");

    let value = handle.join_async().await.expect("task succeeded");
    assert_eq!(value, "ready");
}

#[tokio::test]
async fn test_join_async_many() {
    let pool = WorkerPool::with_threads(4).expect("Failed to create pool");
    let handles = pool
        .submit_many_with_result(6, || Ok(7u32))
        .expect("Failed to submit tasks");

    let mut total = 0;
    for handle in handles {
        total += handle.join_async().await.expect("task succeeded");
    }
    assert_eq!(total, 42);
}

#[test]
fn test_join_async_reports_panic() {
    let pool = WorkerPool::with_threads(1).expect("Failed to create pool");
    let handle = pool
        .submit_with_result(|| -> Result<()> { panic!("Intentional panic for testing") })
        .expect("Failed to submit task");

    let outcome = tokio_test::block_on(handle.join_async());
    assert!(matches!(outcome, Err(PoolError::TaskPanicked { .. })));
}

#[test]
fn test_join_async_reports_abandoned() {
    let pool = WorkerPool::new(PoolConfig::new(1)).expect("Failed to create pool");
    let handle = pool
        .submit_with_result(|| Ok(1))
        .expect("Failed to submit task");

    assert_eq!(pool.stop_immediate(), 1);
    let outcome = tokio_test::block_on(handle.join_async());
    assert!(matches!(outcome, Err(PoolError::TaskAbandoned { .. })));
}
