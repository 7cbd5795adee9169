//! # Runtime lifecycle: acquire and release the scheduler of one invocation.
//!
//! A [`SchedulerFactory`] builds a fresh tokio runtime per invocation. The
//! [`RuntimeScope`] owns it for the invocation's duration and releases it on
//! every exit path (including panics) through `Drop`: new work is rejected and
//! any task still owned by the runtime is dropped without blocking.

use std::fmt;
use std::future::Future;
use std::io;

use tokio::runtime::{Builder, Runtime};

/// Builds the scheduler (tokio runtime) for one invocation.
///
/// The runtime must have the IO and time drivers enabled; the signal bridge
/// and exit timeout depend on them.
///
/// Closures `Fn() -> io::Result<Runtime>` implement this trait:
/// ```
/// use runvisor::SchedulerFactory;
///
/// let factory = || {
///     tokio::runtime::Builder::new_multi_thread()
///         .worker_threads(2)
///         .enable_all()
///         .build()
/// };
/// let rt = factory.build().unwrap();
/// drop(rt);
/// ```
pub trait SchedulerFactory: Send + Sync + 'static {
    /// Returns a new runtime.
    fn build(&self) -> io::Result<Runtime>;
}

impl<F> SchedulerFactory for F
where
    F: Fn() -> io::Result<Runtime> + Send + Sync + 'static,
{
    fn build(&self) -> io::Result<Runtime> {
        (self)()
    }
}

/// Default factory: a current-thread runtime with all drivers enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentThread;

impl SchedulerFactory for CurrentThread {
    fn build(&self) -> io::Result<Runtime> {
        Builder::new_current_thread().enable_all().build()
    }
}

/// Exclusive ownership of the runtime for one invocation.
pub(crate) struct RuntimeScope {
    runtime: Option<Runtime>,
}

impl RuntimeScope {
    /// Builds the runtime through `factory`.
    pub(crate) fn acquire(factory: &dyn SchedulerFactory) -> io::Result<Self> {
        let runtime = factory.build()?;
        tracing::debug!(flavor = ?runtime.handle().runtime_flavor(), "scheduler acquired");
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Drives `fut` to completion on the owned runtime.
    pub(crate) fn block_on<F: Future>(&self, fut: F) -> F::Output {
        match &self.runtime {
            Some(rt) => rt.block_on(fut),
            None => unreachable!("runtime is only taken on release"),
        }
    }

    /// Closes the runtime. Called from `Drop`; idempotent.
    fn release(&mut self) {
        if let Some(rt) = self.runtime.take() {
            rt.shutdown_background();
            tracing::debug!("scheduler released");
        }
    }
}

impl Drop for RuntimeScope {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for RuntimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeScope")
            .field("acquired", &self.runtime.is_some())
            .finish()
    }
}
