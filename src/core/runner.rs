//! # Runner: one supervised invocation, start to finish.
//!
//! [`Runner::run`] owns the whole lifecycle of one invocation:
//!
//! ```text
//! run(entry)
//!   RuntimeScope::acquire(factory)                       ─► RunError::Runtime
//!   block_on {
//!     SubscriberSet::new(subscribers | [LogWriter])
//!     Scheduler::new(handle, executor binding)
//!     SignalBridge::arm(termination, cfg.signals)        ─► AlreadyRunning / SignalBridge
//!     scheduler.spawn("entrypoint", entry.launch(termination, scheduler))
//!     supervise(entry, termination, cfg.exit_timeout)    panics caught, re-raised later
//!     Reaper::reap(cfg.reap_grace)                       always
//!     bridge.disarm()                                    LIFO handler restore
//!     subscribers.shutdown()                             every diagnostic delivered
//!   }
//!   RuntimeScope dropped                                 runtime released
//!   Conclusion ─► Ok(Some(v)) | Ok(None) | Err(Entrypoint(e)) | resume_unwind(panic)
//! ```
//!
//! `run` blocks the calling thread and must not be called from inside an async
//! context (tokio refuses to start a runtime from within a runtime).
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use runvisor::{Runner, Scheduler, Termination};
//!
//! let runner = Runner::builder()
//!     .exit_timeout(Duration::from_secs(5))
//!     .build();
//!
//! let out = runner.run(|termination: Termination, scheduler: Scheduler| async move {
//!     let _ticker = scheduler.spawn("ticker", async {
//!         loop {
//!             tokio::time::sleep(Duration::from_secs(1)).await;
//!         }
//!     });
//!     termination.resolved().await;
//!     Ok::<_, std::io::Error>("bye")
//! });
//! assert_eq!(out.unwrap(), Some("bye"));
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;

use crate::core::lifecycle::RuntimeScope;
use crate::core::reaper::Reaper;
use crate::core::signals::{ArmError, SignalBridge};
use crate::core::supervisor::{supervise, Conclusion};
use crate::core::{Config, CurrentThread, RunnerBuilder, Scheduler, SchedulerFactory, Termination};
use crate::error::RunError;
use crate::executor::{Executor, ExecutorBinding};
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};
use crate::tasks::Entrypoint;

/// Name under which the entrypoint task is registered on the scheduler.
pub const ENTRYPOINT_TASK: &str = "entrypoint";

/// Supervises one entrypoint per [`Runner::run`] call.
///
/// Reusable: each call acquires and releases its own scheduler. Calls must not
/// overlap; a second concurrent call fails with [`RunError::AlreadyRunning`].
#[derive(Clone)]
pub struct Runner {
    cfg: Config,
    factory: Arc<dyn SchedulerFactory>,
    executor: Option<Arc<dyn Executor>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Runner {
    /// Creates a runner with the default scheduler factory, no external executor
    /// and the built-in [`LogWriter`] as diagnostic subscriber.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            factory: Arc::new(CurrentThread),
            executor: None,
            subscribers: Vec::new(),
        }
    }

    /// Returns a builder with the default configuration.
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::default()
    }

    pub(crate) fn from_parts(
        cfg: Config,
        factory: Arc<dyn SchedulerFactory>,
        executor: Option<Arc<dyn Executor>>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            cfg,
            factory,
            executor,
            subscribers,
        }
    }

    /// Configuration used by every invocation.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runs `entry` to its conclusion and reaps whatever it left behind.
    ///
    /// ### Returns
    /// - `Ok(Some(value))`: the entrypoint returned `Ok(value)`.
    /// - `Ok(None)`: termination resolved and the entrypoint overran
    ///   [`Config::exit_timeout`]; one timeout diagnostic was emitted.
    /// - `Err(RunError::Entrypoint(e))`: the entrypoint returned `Err(e)`.
    /// - other `Err` variants: the invocation could not be set up.
    ///
    /// ### Panics
    /// A panic of the entrypoint is re-raised on the calling thread once reaping
    /// finished and the scheduler was released.
    pub fn run<En: Entrypoint>(
        &self,
        entry: En,
    ) -> Result<Option<En::Output>, RunError<En::Error>> {
        let scope = RuntimeScope::acquire(self.factory.as_ref()).map_err(RunError::Runtime)?;
        let conclusion = scope.block_on(self.invoke(entry));
        drop(scope);

        match conclusion? {
            Conclusion::Returned(value) => Ok(Some(value)),
            Conclusion::Abandoned => Ok(None),
            Conclusion::Failed(e) => Err(RunError::Entrypoint(e)),
            Conclusion::Cancelled => Err(RunError::EntrypointCancelled),
            Conclusion::Panicked(payload) => panic::resume_unwind(payload),
        }
    }

    async fn invoke<En: Entrypoint>(
        &self,
        entry: En,
    ) -> Result<Conclusion<En::Output, En::Error>, RunError<En::Error>> {
        let subs = SubscriberSet::new(self.subscriber_list());
        let binding = match &self.executor {
            Some(executor) => ExecutorBinding::external(Arc::clone(executor)),
            None => ExecutorBinding::lazy(self.cfg.executor_threads),
        };
        let scheduler = Scheduler::new(Handle::current(), binding);
        let termination = Termination::new();

        let bridge = match SignalBridge::arm(&termination, &self.cfg.signals) {
            Ok(bridge) => bridge,
            Err(e) => {
                subs.shutdown().await;
                return Err(match e {
                    ArmError::Busy => RunError::AlreadyRunning,
                    ArmError::Install { signal, source } => RunError::SignalBridge { signal, source },
                });
            }
        };

        let launched = entry.launch(termination.clone(), scheduler.clone());
        let conclusion = match scheduler.spawn(ENTRYPOINT_TASK, launched) {
            Ok(mut handle) => {
                tracing::debug!(task = %handle.id(), "entrypoint started");
                AssertUnwindSafe(supervise(
                    &mut handle,
                    &termination,
                    self.cfg.exit_timeout,
                    &subs,
                ))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(Conclusion::Panicked)
            }
            // the registry is only closed by the reaper below
            Err(_) => Conclusion::Cancelled,
        };

        Reaper::new(&scheduler, &subs)
            .grace(self.cfg.reap_grace)
            .reap()
            .await;
        bridge.disarm();
        subs.shutdown().await;

        Ok(conclusion)
    }

    fn subscriber_list(&self) -> Vec<Arc<dyn Subscribe>> {
        if self.subscribers.is_empty() {
            vec![Arc::new(LogWriter::new())]
        } else {
            self.subscribers.clone()
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers: Vec<&str> = self.subscribers.iter().map(|s| s.name()).collect();
        f.debug_struct("Runner")
            .field("cfg", &self.cfg)
            .field("external_executor", &self.executor.is_some())
            .field("subscribers", &subscribers)
            .finish()
    }
}

/// Runs `entry` with the default configuration.
///
/// Shorthand for `Runner::default().run(entry)`.
pub fn run<En: Entrypoint>(entry: En) -> Result<Option<En::Output>, RunError<En::Error>> {
    Runner::default().run(entry)
}
