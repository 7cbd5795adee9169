//! # Invocation configuration.
//!
//! Provides [`Config`] centralized settings for one [`Runner`](crate::Runner) invocation.
//!
//! ## Field semantics
//! - `exit_timeout`: bound on the wait for the entrypoint **after** termination resolved
//!   (`None` = wait as long as it takes, `Some(ZERO)` = abandon unless already finished)
//! - `reap_grace`: bound on the wait for cooperative leftovers after they were cancelled
//!   (`None` = wait as long as it takes; stragglers are aborted once it elapses)
//! - `signals`: signal kinds turned into termination (duplicates ignored)
//! - `executor_threads`: size of the default blocking pool (`0` = available parallelism)

use std::time::Duration;

use crate::core::SignalKind;

/// Configuration for one invocation.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for the entrypoint once termination resolved.
    ///
    /// When it elapses the entrypoint is **not** cancelled: one
    /// [`DiagnosticKind::EntrypointTimeout`](crate::DiagnosticKind::EntrypointTimeout)
    /// record is emitted, the invocation returns `Ok(None)`, and the entrypoint is left
    /// to the shutdown reaper.
    pub exit_timeout: Option<Duration>,

    /// Maximum time the reaper waits for cancelled cooperative tasks.
    pub reap_grace: Option<Duration>,

    /// OS signals that request termination.
    pub signals: Vec<SignalKind>,

    /// Worker threads of the default blocking pool (`0` = available parallelism).
    ///
    /// Ignored when an external executor is supplied.
    pub executor_threads: usize,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `exit_timeout = None` (wait for the entrypoint indefinitely)
    /// - `reap_grace = None` (wait for cancelled tasks indefinitely)
    /// - `signals = [Interrupt, Terminate]`
    /// - `executor_threads = 0` (available parallelism)
    fn default() -> Self {
        Self {
            exit_timeout: None,
            reap_grace: None,
            signals: SignalKind::DEFAULT.to_vec(),
            executor_threads: 0,
        }
    }
}
