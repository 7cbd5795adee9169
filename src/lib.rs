//! # runvisor
//!
//! **Runvisor** supervises a single long-running async entrypoint for the whole
//! lifetime of a process.
//!
//! It starts a scheduler (a tokio runtime), runs the entrypoint, turns
//! `SIGINT`/`SIGTERM` into a graceful-stop request, bounds how long it waits for
//! the entrypoint afterwards, and unconditionally reaps whatever concurrent work
//! is left before returning. Cleanup failures never mask the entrypoint's own
//! outcome; they are reported through a diagnostic channel.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Runner::run(entry)                                              │
//! │                                                                  │
//! │  RuntimeScope ── acquire(SchedulerFactory) ... release on drop   │
//! │     │                                                            │
//! │     ├─► SignalBridge ── SIGINT/SIGTERM ──► Termination.resolve() │
//! │     │                                                            │
//! │     ├─► Scheduler ── spawn("entrypoint", entry(term, scheduler)) │
//! │     │       └─ Registry (every task spawned through the handle)  │
//! │     │                                                            │
//! │     ├─► supervise: entry finished  ⟷  termination resolved       │
//! │     │       └─ exit_timeout elapsed ─► Diagnostic, abandon       │
//! │     │                                                            │
//! │     └─► Reaper: cancel leftovers ─► join ─► Diagnostics          │
//! │                 finalizers ─► owned executor shutdown            │
//! └──────────────────────────────┬───────────────────────────────────┘
//!                                ▼
//!                         SubscriberSet ──► LogWriter / custom Subscribe
//! ```
//!
//! ### Lifecycle
//! ```text
//! acquire scheduler ─► arm signals ─► launch entrypoint
//!                                         │
//!          ┌──────────────────────────────┴──────────────────────────┐
//!          ▼                                                         ▼
//!   entrypoint finished first                             termination resolved first
//!   └─► resolve termination                               └─► wait ≤ exit_timeout
//!          │                                                   ├─ finished ─► outcome
//!          │                                                   └─ elapsed  ─► Ok(None) + diagnostic
//!          └──────────────────────────────┬──────────────────────────┘
//!                                         ▼
//!                      reap leftovers ─► disarm signals ─► release scheduler
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------------|--------------------------------------------|
//! | **Invocation**    | Run one entrypoint end-to-end, with builder-style configuration.   | [`Runner`], [`RunnerBuilder`], [`run`]     |
//! | **Termination**   | Single-resolution graceful-stop event, fed by OS signals.          | [`Termination`], [`SignalKind`]            |
//! | **Scheduling**    | Spawn reapable descendants, register shutdown finalizers.          | [`Scheduler`], [`TaskHandle`], [`TaskState`] |
//! | **Blocking work** | Offload to an external executor or a lazily created default pool.  | [`Executor`], [`ThreadPool`]               |
//! | **Diagnostics**   | Non-fatal reports of timeouts and cleanup failures.                | [`Diagnostic`], [`Subscribe`], [`LogWriter`] |
//! | **Errors**        | Typed errors for setup, tasks, spawning and offload.               | [`RunError`], [`TaskError`], [`SpawnError`], [`ExecutorError`] |
//! | **Configuration** | Exit timeout, reap grace, signal set, pool size.                   | [`Config`]                                 |
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use runvisor::{Runner, Scheduler, Termination};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = Runner::builder()
//!         .exit_timeout(Duration::from_secs(10))
//!         .build();
//!
//!     let served = runner.run(|termination: Termination, scheduler: Scheduler| async move {
//!         // Descendants are cancelled by the reaper if still running at exit.
//!         scheduler.spawn("heartbeat", async {
//!             loop {
//!                 tokio::time::sleep(Duration::from_secs(1)).await;
//!                 println!("alive");
//!             }
//!         })?;
//!
//!         // Wait for SIGINT/SIGTERM, then stop on our own terms.
//!         termination.resolved().await;
//!         Ok::<_, runvisor::SpawnError>(42)
//!     })?;
//!
//!     match served {
//!         Some(n) => println!("served {n} requests"),
//!         None => eprintln!("entrypoint abandoned after exit timeout"),
//!     }
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod executor;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    run, Config, CurrentThread, Runner, RunnerBuilder, Scheduler, SchedulerFactory, SignalKind,
    Termination, ENTRYPOINT_TASK,
};
pub use error::{ExecutorError, RunError, SpawnError, TaskError};
pub use events::{Diagnostic, DiagnosticKind};
pub use executor::{Executor, Job, ThreadPool};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Entrypoint, TaskHandle, TaskId, TaskState};

// Token handed to cooperative tasks by `Scheduler::spawn_cancellable`.
pub use tokio_util::sync::CancellationToken;
