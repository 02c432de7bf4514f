//! Lifecycle control example
//!
//! Walks a pool through pause/resume, resizing, detaching its backlog and
//! both ways of stopping.
//!
//! Run with: RUST_LOG=rust_worker_pool=debug cargo run --example lifecycle

use rust_worker_pool::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn slow_task(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> Result<()> + Send + 'static {
    let counter = Arc::clone(counter);
    move || {
        thread::sleep(Duration::from_millis(20));
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Rust Worker Pool - Lifecycle Example ===\n");
    let counter = Arc::new(AtomicUsize::new(0));

    let config = PoolConfig::new(2).with_thread_name_prefix("lifecycle");
    let pool = WorkerPool::with_config(config)?;

    println!("1. Pausing and buffering 8 tasks");
    pool.pause()?;
    for _ in 0..8 {
        pool.execute(slow_task(&counter))?;
    }
    println!("   state: {}, queued: {}", pool.state(), pool.queue_length());

    println!("\n2. Growing to 4 workers, then resuming");
    pool.resize(4)?;
    pool.resume()?;
    thread::sleep(Duration::from_millis(100));
    println!("   completed so far: {}", counter.load(Ordering::Relaxed));

    println!("\n3. Detaching a backlog to a separate pool");
    pool.pause()?;
    for _ in 0..6 {
        pool.execute(slow_task(&counter))?;
    }
    let detached = pool.detach(3)?;
    println!(
        "   handed {} tasks to '{}'",
        detached.handed_off(),
        detached.pool().name()
    );
    let reaper = detached.reap_in_background()?;
    pool.resume()?;

    println!("\n4. Shrinking back to the initial worker count");
    pool.reset_to_default_count()?;
    println!("   workers: {}", pool.worker_count());

    let summary = reaper.join()?;
    println!(
        "\n5. Detached pool finished: {} completed, clean: {}",
        summary.completed, summary.clean_shutdown
    );

    println!("\n6. Dropping a backlog with stop_immediate");
    for _ in 0..20 {
        pool.execute(slow_task(&counter))?;
    }
    let dropped = pool.stop_immediate();
    println!("   dropped {} queued tasks", dropped);
    if let Err(e) = pool.execute(slow_task(&counter)) {
        println!("   late submission rejected: {}", e);
    }

    pool.shutdown()?;
    let stats = pool.stats();
    println!(
        "\n7. Final: submitted {}, completed {}, discarded {}, detached {}",
        stats.submitted, stats.completed, stats.discarded, stats.detached
    );

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
