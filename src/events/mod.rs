//! Diagnostic records: the non-fatal reporting path of the runtime.
//!
//! Cleanup-phase failures and exit-timeout expiry are never returned to the caller;
//! they are published as [`Diagnostic`]s and delivered to every subscriber through
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contents
//! - [`DiagnosticKind`], [`Diagnostic`] classification and payload metadata
//!
//! ## Quick reference
//! - **Publishers**: the entrypoint supervisor (exit timeout) and the shutdown
//!   reaper (failed leftover tasks, failed finalizers).
//! - **Consumers**: user subscribers, or the built-in [`LogWriter`](crate::LogWriter).

mod diagnostic;

pub use diagnostic::{Diagnostic, DiagnosticKind};
