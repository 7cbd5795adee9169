//! # Diagnostic subscriber trait.
//!
//! Provides [`Subscribe`] an extension point for plugging custom handlers into the
//! diagnostic channel.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (a panicking handler is logged and the worker keeps going)
//!
//! ## Architecture
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_diagnostic()
//!                                    └─► panic caught → tracing::warn!
//! ```
//!
//! ## Rules
//! - A slow subscriber only affects its own queue.
//! - Queue overflow drops the record **for this subscriber only**.
//! - Records are processed sequentially (FIFO) per subscriber.
//! - All queued records are delivered before [`Runner::run`](crate::Runner::run) returns.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use runvisor::{Diagnostic, DiagnosticKind, Subscribe};
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_diagnostic(&self, d: &Diagnostic) {
//!         if matches!(d.kind, DiagnosticKind::EntrypointTimeout) {
//!             // page someone, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "alerts" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Diagnostic;

/// Diagnostic subscriber.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the scheduler.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single diagnostic.
    ///
    /// Called from a dedicated worker task, in FIFO order per subscriber.
    async fn on_diagnostic(&self, diagnostic: &Diagnostic);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// The runtime clamps capacity to a minimum of 1.
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
