//! # Example: blocking_offload
//!
//! Offloads blocking work from the entrypoint, first to the default pool, then to
//! a caller-owned pool that outlives the invocation.
//!
//! Shows how to:
//! - Call [`Scheduler::run_blocking`] without configuring anything.
//! - Bind an external [`ThreadPool`] with [`RunnerBuilder::executor`].
//! - Keep using the external pool after [`Runner::run`] returned.
//!
//! ## Flow
//! ```text
//! run #1 (default pool)
//!   run_blocking(hash) ──► lazily started pool ──► shut down by the reaper
//!
//! run #2 (external pool)
//!   run_blocking(hash) ──► caller's pool ──► only unbound by the reaper
//!   caller keeps submitting jobs, then shuts the pool down itself
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=runvisor=debug cargo run --example blocking_offload
//! ```

use std::sync::{mpsc, Arc};

use runvisor::{
    Config, Executor, ExecutorError, Runner, Scheduler, Termination, ThreadPool,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Deliberately slow, CPU-bound stand-in for real blocking work.
fn checksum(data: &[u8]) -> u64 {
    data.iter().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
    })
}

async fn hash_block(_t: Termination, scheduler: Scheduler) -> Result<u64, ExecutorError> {
    let data = vec![7u8; 4 * 1024 * 1024];
    scheduler.run_blocking(move || checksum(&data)).await
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().compact())
        .init();

    // default pool, sized from the config
    let cfg = Config {
        executor_threads: 2,
        ..Config::default()
    };
    let sum = Runner::new(cfg).run(hash_block)?;
    println!("default pool: checksum={sum:?}");

    // caller-owned pool
    let pool = Arc::new(ThreadPool::new(2)?);
    let runner = Runner::builder().executor(pool.clone()).build();
    let sum = runner.run(hash_block)?;
    println!("external pool: checksum={sum:?}");

    let (tx, rx) = mpsc::channel();
    pool.execute(Box::new(move || {
        let _ = tx.send(checksum(b"after the run"));
    }))?;
    println!("external pool still serving: {}", rx.recv()?);
    pool.shutdown();
    Ok(())
}
