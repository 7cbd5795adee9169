//! # Blocking-offload executors.
//!
//! The scheduler's tasks must not block its thread; blocking work goes to an
//! [`Executor`] through [`Scheduler::run_blocking`](crate::Scheduler::run_blocking).
//!
//! ## Ownership
//! - **Externally supplied** (via [`RunnerBuilder::executor`](crate::RunnerBuilder::executor)):
//!   the caller owns it. On exit it is only unbound from the scheduler and keeps
//!   accepting work from the caller.
//! - **Default**: created lazily on first use and owned by the invocation. The
//!   shutdown reaper shuts it down; afterwards it rejects submissions.

mod binding;
mod pool;

pub use pool::ThreadPool;

pub(crate) use binding::ExecutorBinding;

use crate::error::ExecutorError;

/// Boxed unit of blocking work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool that runs blocking jobs off the scheduler thread.
pub trait Executor: Send + Sync + 'static {
    /// Queues `job` for execution.
    ///
    /// Returns [`ExecutorError::Shutdown`] once [`Executor::shutdown`] was called.
    fn execute(&self, job: Job) -> Result<(), ExecutorError>;

    /// Stops accepting jobs and waits for the running ones to return.
    ///
    /// Blocking; idempotent. Whether jobs still queued run is up to the
    /// implementation ([`ThreadPool`] discards them).
    fn shutdown(&self);

    /// Returns `true` once [`Executor::shutdown`] was called.
    fn is_shutdown(&self) -> bool;
}
