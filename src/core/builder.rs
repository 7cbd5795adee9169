use std::sync::Arc;
use std::time::Duration;

use crate::core::{Config, CurrentThread, Runner, SchedulerFactory, SignalKind};
use crate::executor::Executor;
use crate::subscribers::Subscribe;

/// Builder for constructing a [`Runner`] with optional collaborators.
pub struct RunnerBuilder {
    cfg: Config,
    factory: Option<Arc<dyn SchedulerFactory>>,
    executor: Option<Arc<dyn Executor>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RunnerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            factory: None,
            executor: None,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Bounds the wait for the entrypoint after termination resolved.
    pub fn exit_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.exit_timeout = Some(timeout);
        self
    }

    /// Bounds the wait for cancelled cooperative tasks while reaping.
    pub fn reap_grace(mut self, grace: Duration) -> Self {
        self.cfg.reap_grace = Some(grace);
        self
    }

    /// Sets the OS signals that request termination.
    pub fn signals(mut self, kinds: impl IntoIterator<Item = SignalKind>) -> Self {
        self.cfg.signals = kinds.into_iter().collect();
        self
    }

    /// Sets the factory that builds the scheduler of each invocation.
    ///
    /// Default: [`CurrentThread`].
    pub fn scheduler_factory(mut self, factory: impl SchedulerFactory) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Binds a caller-owned executor for blocking offload.
    ///
    /// The runner never shuts it down; it is only unbound when an invocation ends.
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets diagnostic subscribers.
    ///
    /// Subscribers receive timeout and shutdown-failure diagnostics through
    /// dedicated workers with bounded queues. With none set, [`LogWriter`](crate::LogWriter)
    /// is used.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the [`Runner`].
    pub fn build(self) -> Runner {
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(CurrentThread) as Arc<dyn SchedulerFactory>);
        Runner::from_parts(self.cfg, factory, self.executor, self.subscribers)
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
