//! # Diagnostics emitted while an invocation winds down.
//!
//! The [`DiagnosticKind`] enum classifies the records the runtime reports instead
//! of raising:
//! - **Supervisor**: the entrypoint overran the exit timeout and was abandoned.
//! - **Reaper**: a leftover task or a shutdown finalizer failed during cleanup.
//!
//! The [`Diagnostic`] struct carries the record's message, the rendered error and
//! the task it concerns.
//!
//! ## Ordering guarantees
//! Each diagnostic has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use runvisor::{Diagnostic, DiagnosticKind};
//!
//! let d = Diagnostic::new(DiagnosticKind::ShutdownFailure)
//!     .with_task_name("flusher")
//!     .with_error("disk full");
//!
//! assert_eq!(d.message, "unhandled exception during shutdown");
//! assert_eq!(d.task_name.as_deref(), Some("flusher"));
//! assert_eq!(d.error.as_deref(), Some("disk full"));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::tasks::TaskId;

/// Global sequence counter for diagnostic ordering.
static DIAGNOSTIC_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A leftover task failed while being reaped.
    ///
    /// Sets:
    /// - `task`, `task_name`: the failed task
    /// - `error`: panic message
    ShutdownFailure,

    /// The entrypoint did not finish within the exit timeout after termination.
    ///
    /// Sets:
    /// - `task`, `task_name`: the entrypoint task
    /// - `error`: elapsed description
    /// - `timeout_ms`: configured exit timeout
    EntrypointTimeout,

    /// A shutdown finalizer panicked.
    ///
    /// Sets:
    /// - `task_name`: finalizer name
    /// - `error`: panic message
    FinalizerFailure,
}

impl DiagnosticKind {
    /// Fixed human-readable message for this kind.
    pub fn message(self) -> &'static str {
        match self {
            DiagnosticKind::ShutdownFailure => "unhandled exception during shutdown",
            DiagnosticKind::EntrypointTimeout => "entrypoint out of timeout",
            DiagnosticKind::FinalizerFailure => "unhandled exception during shutdown finalizer",
        }
    }

    /// Short stable label (snake_case) for logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            DiagnosticKind::ShutdownFailure => "shutdown_failure",
            DiagnosticKind::EntrypointTimeout => "entrypoint_timeout",
            DiagnosticKind::FinalizerFailure => "finalizer_failure",
        }
    }
}

/// Diagnostic record.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`DiagnosticKind`]
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Classification.
    pub kind: DiagnosticKind,
    /// Human-readable message, fixed per kind.
    pub message: &'static str,
    /// Rendered error (panic message, timeout description).
    pub error: Option<Arc<str>>,
    /// Task identifier, if the record concerns a spawned task.
    pub task: Option<TaskId>,
    /// Task or finalizer name.
    pub task_name: Option<Arc<str>>,
    /// Exit timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Diagnostic {
    /// Creates a new record of the given kind with current timestamp and next sequence number.
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            seq: DIAGNOSTIC_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            message: kind.message(),
            error: None,
            task: None,
            task_name: None,
            timeout_ms: None,
        }
    }

    /// Attaches a rendered error.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a task identifier.
    #[inline]
    pub fn with_task(mut self, id: TaskId) -> Self {
        self.task = Some(id);
        self
    }

    /// Attaches a task or finalizer name.
    #[inline]
    pub fn with_task_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.task_name = Some(name.into());
        self
    }

    /// Attaches the exit timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)?;
        if let Some(task) = self.task {
            write!(f, " task={task}")?;
        }
        if let Some(name) = &self.task_name {
            write!(f, " name={name}")?;
        }
        if let Some(error) = &self.error {
            write!(f, " error={error}")?;
        }
        Ok(())
    }
}
