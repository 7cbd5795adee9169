//! # Entrypoint: the unit of work supervised for the whole invocation.
//!
//! An [`Entrypoint`] receives the invocation's [`Termination`] handle and the
//! [`Scheduler`] handle, and produces a future resolving to `Result<Output, Error>`.
//! It alone decides how to react to termination; the runtime never cancels it
//! while supervising, only while reaping after the outcome is settled.
//!
//! Any closure `FnOnce(Termination, Scheduler) -> Fut` is an entrypoint:
//! ```rust
//! use std::convert::Infallible;
//! use runvisor::{Scheduler, Termination};
//!
//! let entry = |termination: Termination, _scheduler: Scheduler| async move {
//!     termination.resolved().await;
//!     Ok::<_, Infallible>("stopped")
//! };
//! # let _ = entry;
//! ```

use std::future::Future;

use futures::future::BoxFuture;

use crate::core::{Scheduler, Termination};

/// Caller-supplied asynchronous work supervised end-to-end.
pub trait Entrypoint: Send + 'static {
    /// Value produced on success.
    type Output: Send + 'static;
    /// Error propagated to the caller on failure.
    type Error: Send + 'static;

    /// Builds the entrypoint future.
    fn launch(
        self,
        termination: Termination,
        scheduler: Scheduler,
    ) -> BoxFuture<'static, Result<Self::Output, Self::Error>>;
}

impl<F, Fut, T, E> Entrypoint for F
where
    F: FnOnce(Termination, Scheduler) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn launch(self, termination: Termination, scheduler: Scheduler) -> BoxFuture<'static, Result<T, E>> {
        Box::pin((self)(termination, scheduler))
    }
}
