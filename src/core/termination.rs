//! # Termination: single-resolution "graceful stop requested" event.
//!
//! A [`Termination`] starts `pending` and becomes `resolved` at most once; it never
//! reverts. Resolving it again is a no-op. It is resolved by the signal bridge
//! (on the scheduler, after a signal arrives) or by the supervisor once the
//! entrypoint finishes first, so nothing waiting on it can hang.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Handle to the termination event of one invocation.
///
/// Cheap to clone; all clones observe the same event.
#[derive(Clone, Debug, Default)]
pub struct Termination {
    token: CancellationToken,
}

impl Termination {
    /// Creates a new, pending termination event.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Resolves the event. Idempotent.
    pub fn resolve(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the event has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the event is resolved (immediately if it already is).
    pub fn resolved(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Returns a token that is cancelled when termination resolves.
    ///
    /// Useful to hand a plain [`CancellationToken`] to code that already speaks it.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
