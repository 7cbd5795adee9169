//! # Example: graceful_worker
//!
//! A worker that drains a queue until asked to stop.
//!
//! Shows how to:
//! - Wait on [`Termination`] inside the entrypoint.
//! - Spawn an abortable descendant (`ticker`) and a cooperative one (`flusher`).
//! - Register a shutdown finalizer with [`Scheduler::on_shutdown`].
//! - Attach a custom [`Subscribe`] next to the built-in [`LogWriter`].
//!
//! ## Flow
//! ```text
//! Runner::run()
//!   ├─► entrypoint: consume jobs until termination resolves
//!   │     ├─► spawn("ticker")                    dropped by the reaper
//!   │     ├─► spawn_cancellable("flusher")       flushes, then returns
//!   │     └─► on_shutdown("close-queue")         runs after leftovers were reaped
//!   ├─► Ctrl-C / SIGTERM ──► termination resolved
//!   └─► entrypoint returns the number of processed jobs
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example graceful_worker
//! # press Ctrl-C
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use runvisor::{
    Diagnostic, LogWriter, RunError, Runner, Scheduler, SpawnError, Subscribe, Termination,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Counts diagnostics; in real life this could bump a metric or page someone.
#[derive(Default)]
struct Counter(AtomicU64);

#[async_trait::async_trait]
impl Subscribe for Counter {
    async fn on_diagnostic(&self, d: &Diagnostic) {
        let n = self.0.fetch_add(1, Ordering::Relaxed) + 1;
        println!("[sub] #{n} {} ({})", d.message, d.kind.as_label());
    }

    fn name(&self) -> &'static str {
        "counter"
    }
}

async fn worker(termination: Termination, scheduler: Scheduler) -> Result<u64, SpawnError> {
    scheduler.spawn("ticker", async {
        let mut tick = tokio::time::interval(Duration::from_secs(2));
        loop {
            tick.tick().await;
            tracing::info!("still working");
        }
    })?;

    scheduler.spawn_cancellable("flusher", |token| async move {
        token.cancelled().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        tracing::info!("buffers flushed");
    })?;

    scheduler.on_shutdown("close-queue", async {
        tracing::info!("queue closed");
    })?;

    let mut processed = 0u64;
    loop {
        tokio::select! {
            _ = termination.resolved() => break,
            _ = tokio::time::sleep(Duration::from_millis(300)) => {
                processed += 1;
                tracing::debug!(processed, "job done");
            }
        }
    }
    Ok(processed)
}

fn main() -> Result<(), RunError<SpawnError>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().compact())
        .init();

    let counter = Arc::new(Counter::default());
    let runner = Runner::builder()
        .exit_timeout(Duration::from_secs(5))
        .reap_grace(Duration::from_secs(2))
        .with_subscribers(vec![counter.clone() as Arc<dyn Subscribe>, Arc::new(LogWriter::new())])
        .build();

    match runner.run(worker)? {
        Some(processed) => println!("processed {processed} jobs"),
        None => println!("worker abandoned after exit timeout"),
    }
    println!("diagnostics: {}", counter.0.load(Ordering::Relaxed));
    Ok(())
}
