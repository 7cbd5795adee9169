//! # Scheduler: explicit handle to the runtime of one invocation.
//!
//! The entrypoint receives a [`Scheduler`] and uses it to spawn descendant tasks,
//! register shutdown finalizers and offload blocking work. Everything spawned
//! through it is visible to the shutdown reaper; work spawned with bare
//! `tokio::spawn` is not, and is simply dropped when the runtime is released.
//!
//! ```text
//! Scheduler ─┬─► spawn(name, fut)              abortable task
//!            ├─► spawn_cancellable(name, f)    cooperative task (gets a CancellationToken)
//!            ├─► on_shutdown(name, fut)        finalizer run by the reaper
//!            └─► run_blocking(f)               bound executor (default pool on demand)
//! ```

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::registry::{Mode, Registry};
use crate::error::{panic_message, ExecutorError, SpawnError};
use crate::executor::{Executor, ExecutorBinding};
use crate::tasks::TaskHandle;

struct Inner {
    runtime: Handle,
    registry: Arc<Registry>,
    executor: ExecutorBinding,
}

/// Cloneable handle to the invocation's scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub(crate) fn new(runtime: Handle, executor: ExecutorBinding) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                registry: Registry::new(),
                executor,
            }),
        }
    }

    /// Spawns an abortable task.
    ///
    /// If the task is still running when the invocation shuts down, its future is
    /// dropped at its current suspension point and its state becomes
    /// [`TaskState::Cancelled`](crate::TaskState::Cancelled).
    pub fn spawn<F>(&self, name: &str, fut: F) -> Result<TaskHandle<F::Output>, SpawnError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner
            .registry
            .spawn(&self.inner.runtime, Mode::Abortable, name, |_| fut)
    }

    /// Spawns a cooperative task.
    ///
    /// `f` receives the task's [`CancellationToken`]. On shutdown the token is
    /// cancelled and the reaper waits for the task to return by itself; a panic
    /// during that cleanup is reported as a shutdown diagnostic.
    pub fn spawn_cancellable<F, Fut>(
        &self,
        name: &str,
        f: F,
    ) -> Result<TaskHandle<Fut::Output>, SpawnError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        self.inner
            .registry
            .spawn(&self.inner.runtime, Mode::Cooperative, name, f)
    }

    /// Registers an async cleanup hook run once during shutdown, after leftover
    /// tasks were reaped.
    pub fn on_shutdown<F>(&self, name: &str, fut: F) -> Result<(), SpawnError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.registry.add_finalizer(name, Box::pin(fut))
    }

    /// Runs blocking `f` on the bound executor and awaits its result.
    ///
    /// Starts the default pool on first use when no executor was supplied.
    pub async fn run_blocking<F, R>(&self, f: F) -> Result<R, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let executor = self.executor()?;
        let (tx, rx) = oneshot::channel();
        executor.execute(Box::new(move || {
            let out = panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
                ExecutorError::Panicked {
                    message: panic_message(payload.as_ref()),
                }
            });
            let _ = tx.send(out);
        }))?;
        rx.await.unwrap_or(Err(ExecutorError::Shutdown))
    }

    /// Returns the executor used for blocking offload.
    pub fn executor(&self) -> Result<Arc<dyn Executor>, ExecutorError> {
        self.inner.executor.get()
    }

    /// Number of tasks spawned through this scheduler that have not finished.
    pub fn live_tasks(&self) -> usize {
        self.inner.registry.len()
    }

    /// Returns `true` once shutdown started and new work is rejected.
    pub fn is_closed(&self) -> bool {
        self.inner.registry.is_closed()
    }

    /// Underlying tokio runtime handle.
    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn executor_binding(&self) -> &ExecutorBinding {
        &self.inner.executor
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("live_tasks", &self.live_tasks())
            .field("closed", &self.is_closed())
            .field("executor", &self.inner.executor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskState;
    use std::time::Duration;

    fn scheduler() -> Scheduler {
        Scheduler::new(Handle::current(), ExecutorBinding::lazy(1))
    }

    #[tokio::test]
    async fn spawn_tracks_live_tasks() {
        let s = scheduler();
        let h = s
            .spawn("nap", tokio::time::sleep(Duration::from_millis(10)))
            .unwrap();
        assert_eq!(s.live_tasks(), 1);
        h.await.unwrap();
        assert_eq!(s.live_tasks(), 0);
    }

    #[tokio::test]
    async fn run_blocking_uses_default_pool() {
        let s = scheduler();
        let v = s.run_blocking(|| 6 * 7).await.unwrap();
        assert_eq!(v, 42);
        let owned = s.executor_binding().release().unwrap();
        tokio::task::spawn_blocking(move || owned.shutdown())
            .await
            .unwrap();
        assert!(matches!(
            s.run_blocking(|| ()).await,
            Err(ExecutorError::Unbound)
        ));
    }

    #[tokio::test]
    async fn run_blocking_reports_panics() {
        let s = scheduler();
        let err = s.run_blocking(|| panic!("blocking boom")).await.unwrap_err();
        assert_eq!(
            err,
            ExecutorError::Panicked {
                message: "blocking boom".into()
            }
        );
        if let Some(owned) = s.executor_binding().release() {
            tokio::task::spawn_blocking(move || owned.shutdown())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn cancel_from_handle_marks_cancelled() {
        let s = scheduler();
        let h = s.spawn("forever", std::future::pending::<()>()).unwrap();
        h.cancel();
        tokio::task::yield_now().await;
        assert_eq!(h.state(), TaskState::Cancelled);
        assert!(h.await.unwrap_err().is_cancelled());
    }
}
