//! Basic worker pool usage example
//!
//! Demonstrates pool creation, task submission, result handles and
//! statistics tracking.
//!
//! Run with: RUST_LOG=info cargo run --example basic_usage

use rust_worker_pool::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Rust Worker Pool - Basic Usage Example ===\n");

    // Create a running pool with 4 workers
    let pool = WorkerPool::with_threads(4)?;
    println!("1. Started pool '{}' with {} workers", pool.name(), pool.worker_count());

    println!("\n2. Submitting simple tasks:");
    for i in 0..10 {
        pool.execute(move || {
            println!(
                "  Task {} executing on {}",
                i,
                thread::current().name().unwrap_or("unnamed")
            );
            thread::sleep(Duration::from_millis(50));
            Ok(())
        })?;
    }
    println!("   Submitted 10 tasks");

    println!("\n3. Collecting results through handles:");
    let handles = pool.submit_many_with_result(4, || Ok(6 * 7))?;
    for handle in handles {
        let id = handle.task_id();
        println!("   Task #{} returned {}", id, handle.join()?);
    }

    println!("\n4. A failing task is contained:");
    pool.submit(ClosureTask::with_name(
        || Err(PoolError::other("record 17 is malformed")),
        "import",
    ))?;
    thread::sleep(Duration::from_millis(200));
    for failed in pool.drain_failed_tasks() {
        println!(
            "   {} failed on worker {}: {}",
            failed.task_name, failed.worker_id, failed.failure
        );
    }

    println!("\n5. Per-worker statistics:");
    for stat in pool.worker_stats() {
        println!(
            "   Worker {}: {} completed, {} failed, avg time: {:.2}μs",
            stat.worker_id,
            stat.tasks_completed,
            stat.tasks_failed,
            stat.average_processing_time_us
        );
    }

    println!("\n6. Shutting down...");
    pool.shutdown()?;

    println!("\n7. Final statistics:");
    println!("{}", pool.stats().to_json()?);

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
