//! Error types used by the runvisor runtime, its tasks and its executor.
//!
//! - [`RunError`]: the outcome of a failed invocation (the entrypoint's own error, or setup failures).
//! - [`TaskError`]: why awaiting a [`TaskHandle`](crate::TaskHandle) produced no value.
//! - [`SpawnError`]: the scheduler refused new work.
//! - [`ExecutorError`]: blocking offload failures.
//!
//! Every type provides `as_label()`, a short stable snake_case label for logs/metrics.

use std::any::Any;
use std::fmt;
use std::io;

use thiserror::Error;

use crate::core::SignalKind;

/// # Errors returned by [`Runner::run`](crate::Runner::run).
///
/// Only [`RunError::Entrypoint`] carries a failure of the supervised work itself;
/// every other variant means the invocation could not be set up. Failures observed
/// while reaping leftover tasks are never returned here; they go to the diagnostic channel.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError<E> {
    /// The entrypoint returned an error.
    #[error("entrypoint failed: {0}")]
    Entrypoint(E),

    /// The entrypoint task was cancelled before it produced an outcome.
    #[error("entrypoint cancelled before completion")]
    EntrypointCancelled,

    /// The scheduler factory failed to build a runtime.
    #[error("failed to build scheduler: {0}")]
    Runtime(#[source] io::Error),

    /// A termination signal handler could not be installed.
    #[error("failed to arm handler for {signal}: {source}")]
    SignalBridge {
        /// Signal whose handler failed to install.
        signal: SignalKind,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Another invocation already owns the process signal handlers.
    #[error("another invocation is already running in this process")]
    AlreadyRunning,
}

impl<E> RunError<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use runvisor::RunError;
    ///
    /// let err: RunError<std::io::Error> = RunError::AlreadyRunning;
    /// assert_eq!(err.as_label(), "run_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::Entrypoint(_) => "run_entrypoint_failed",
            RunError::EntrypointCancelled => "run_entrypoint_cancelled",
            RunError::Runtime(_) => "run_runtime_build_failed",
            RunError::SignalBridge { .. } => "run_signal_bridge_failed",
            RunError::AlreadyRunning => "run_already_running",
        }
    }

    /// Returns the entrypoint's own error, if that is what this is.
    pub fn into_entrypoint(self) -> Option<E> {
        match self {
            RunError::Entrypoint(e) => Some(e),
            _ => None,
        }
    }
}

/// # Errors produced when awaiting a spawned task.
#[non_exhaustive]
#[derive(Error)]
pub enum TaskError {
    /// Task was cancelled (reaped or explicitly cancelled) before producing a value.
    #[error("task cancelled")]
    Cancelled,

    /// Task panicked.
    #[error("task panicked: {message}")]
    Panicked {
        /// Rendered panic message.
        message: String,
        /// Original panic payload, suitable for [`std::panic::resume_unwind`].
        payload: Box<dyn Any + Send + 'static>,
    },
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Cancelled => "task_cancelled",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns `true` if the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// Consumes the error and returns the panic payload, if the task panicked.
    pub fn into_panic(self) -> Option<Box<dyn Any + Send + 'static>> {
        match self {
            TaskError::Panicked { payload, .. } => Some(payload),
            TaskError::Cancelled => None,
        }
    }

    pub(crate) fn panicked(payload: Box<dyn Any + Send + 'static>) -> Self {
        TaskError::Panicked {
            message: panic_message(payload.as_ref()),
            payload,
        }
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Cancelled => f.write_str("Cancelled"),
            TaskError::Panicked { message, .. } => {
                f.debug_struct("Panicked").field("message", message).finish()
            }
        }
    }
}

/// # Errors produced when the scheduler rejects new work.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The scheduler is shutting down and no longer accepts tasks or finalizers.
    #[error("scheduler is closed")]
    Closed,
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::Closed => "spawn_scheduler_closed",
        }
    }
}

/// # Errors produced by blocking offload.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The executor was shut down and rejects submissions.
    #[error("executor is shut down")]
    Shutdown,

    /// No executor is bound to the scheduler any more.
    #[error("no executor bound to the scheduler")]
    Unbound,

    /// The default executor could not start its worker threads.
    #[error("failed to start default executor: {message}")]
    Start {
        /// Underlying OS error, rendered.
        message: String,
    },

    /// The submitted job panicked.
    #[error("blocking job panicked: {message}")]
    Panicked {
        /// Rendered panic message.
        message: String,
    },
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::Shutdown => "executor_shutdown",
            ExecutorError::Unbound => "executor_unbound",
            ExecutorError::Start { .. } => "executor_start_failed",
            ExecutorError::Panicked { .. } => "executor_job_panicked",
        }
    }
}

/// Renders a panic payload the way the standard panic hook does.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_renders_str_and_string() {
        let a: Box<dyn Any + Send> = Box::new("boom");
        let b: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let c: Box<dyn Any + Send> = Box::new(7_u32);
        assert_eq!(panic_message(a.as_ref()), "boom");
        assert_eq!(panic_message(b.as_ref()), "bang");
        assert_eq!(panic_message(c.as_ref()), "Box<dyn Any>");
    }

    #[test]
    fn task_error_keeps_payload() {
        let err = TaskError::panicked(Box::new("kaput"));
        assert_eq!(err.to_string(), "task panicked: kaput");
        assert_eq!(err.as_label(), "task_panicked");
        let payload = err.into_panic().unwrap();
        assert_eq!(*payload.downcast::<&str>().unwrap(), "kaput");
    }

    #[test]
    fn run_error_exposes_entrypoint_error() {
        let err: RunError<String> = RunError::Entrypoint("nope".into());
        assert_eq!(err.to_string(), "entrypoint failed: nope");
        assert_eq!(err.into_entrypoint().as_deref(), Some("nope"));
    }
}
