//! # LogWriter: default diagnostic subscriber.
//!
//! Writes every [`Diagnostic`] as a `tracing` record at ERROR level. Installed
//! automatically when no subscriber is configured.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! ERROR runvisor: entrypoint out of timeout kind="entrypoint_timeout" task=task-1 name="entrypoint" error="deadline has elapsed"
//! ERROR runvisor: unhandled exception during shutdown kind="shutdown_failure" task=task-4 name="flusher" error="disk full"
//! ```

use async_trait::async_trait;

use crate::events::Diagnostic;
use crate::subscribers::Subscribe;

/// Diagnostic writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_diagnostic(&self, d: &Diagnostic) {
        let task = d.task.map(|t| t.to_string());
        tracing::error!(
            target: "runvisor",
            kind = d.kind.as_label(),
            task = task.as_deref().unwrap_or("-"),
            name = d.task_name.as_deref().unwrap_or("-"),
            error = d.error.as_deref().unwrap_or("-"),
            "{}",
            d.message
        );
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
