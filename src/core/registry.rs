//! # Task registry - live tasks and shutdown finalizers of one scheduler.
//!
//! Tokio cannot enumerate the tasks of a runtime, so every task spawned through
//! the [`Scheduler`](crate::Scheduler) is recorded here. A task removes its own
//! entry when its wrapper exits, so what remains is exactly the unfinished work.
//!
//! ## Architecture
//! ```text
//! Scheduler::spawn*()
//!     └─► Registry::spawn(mode, name, fut)
//!            ├─► rt.spawn(wrapper)        catch_unwind + status cell + oneshot delivery
//!            └─► tasks.insert(id, Entry)  unless closed or already finished
//!
//! wrapper exits (any path) ──► ExitGuard::drop ──► tasks.remove(id)
//!
//! Reaper
//!     └─► Registry::close()  → no more spawns/finalizers
//!     └─► Registry::drain()  → remaining entries (unfinished tasks)
//!     └─► Registry::take_finalizers()
//! ```
//!
//! ## Rules
//! - Registry owns the task handles (JoinHandle + CancellationToken).
//! - Spawning after `close()` fails with [`SpawnError::Closed`].
//! - Abortable tasks are dropped when their token is cancelled; cooperative tasks
//!   receive the token and finish by themselves.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{panic_message, SpawnError};
use crate::tasks::{TaskCell, TaskHandle, TaskId};

/// How a task reacts to cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Future is dropped once the token is cancelled.
    Abortable,
    /// Future receives the token and keeps running until it returns.
    Cooperative,
}

/// A registered task that has not finished yet.
pub(crate) struct Entry {
    pub(crate) id: TaskId,
    pub(crate) name: Arc<str>,
    pub(crate) join: JoinHandle<()>,
    pub(crate) cancel: CancellationToken,
    pub(crate) cell: Arc<TaskCell>,
}

/// Async cleanup hook run by the reaper.
pub(crate) struct Finalizer {
    pub(crate) name: Arc<str>,
    pub(crate) fut: BoxFuture<'static, ()>,
}

#[derive(Default)]
struct State {
    closed: bool,
    tasks: HashMap<TaskId, Entry>,
    finalizers: Vec<Finalizer>,
}

/// Registry of live tasks.
#[derive(Default)]
pub(crate) struct Registry {
    state: Mutex<State>,
}

impl Registry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Spawns `make(token)` on `rt` and records it.
    pub(crate) fn spawn<F, Fut>(
        self: &Arc<Self>,
        rt: &Handle,
        mode: Mode,
        name: &str,
        make: F,
    ) -> Result<TaskHandle<Fut::Output>, SpawnError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let id = TaskId::next();
        let name: Arc<str> = Arc::from(name);
        let token = CancellationToken::new();
        let cell = TaskCell::new();
        let (tx, rx) = oneshot::channel();

        // built before locking: constructing the future may itself spawn
        let fut = make(token.clone());

        let guard = ExitGuard {
            id,
            cell: Arc::clone(&cell),
            registry: Arc::downgrade(self),
        };
        let watched = token.clone();
        let wrapper = async move {
            let guard = guard;
            let run = AssertUnwindSafe(fut).catch_unwind();
            let outcome = match mode {
                Mode::Abortable => tokio::select! {
                    biased;
                    _ = watched.cancelled() => return,
                    out = run => out,
                },
                Mode::Cooperative => run.await,
            };
            match outcome {
                Ok(value) => {
                    guard.cell.complete();
                    let _ = tx.send(Ok(value));
                }
                Err(payload) => {
                    guard.cell.fail(panic_message(payload.as_ref()));
                    let _ = tx.send(Err(payload));
                }
            }
        };

        if self.is_closed() {
            return Err(SpawnError::Closed);
        }
        // spawned outside the lock: a rejected or torn-down wrapper re-enters it on drop
        let join = rt.spawn(wrapper);

        let mut state = self.lock();
        if state.closed {
            drop(state);
            join.abort();
            return Err(SpawnError::Closed);
        }
        // the wrapper may already be gone on a multi-thread runtime; its guard
        // recorded a final state before trying to remove the entry
        if !cell.state().is_finished() {
            state.tasks.insert(
                id,
                Entry {
                    id,
                    name: Arc::clone(&name),
                    join,
                    cancel: token.clone(),
                    cell: Arc::clone(&cell),
                },
            );
        }
        drop(state);

        tracing::trace!(task = %id, name = %name, ?mode, "task spawned");
        Ok(TaskHandle::new(id, name, cell, token, rx))
    }

    /// Registers an async cleanup hook for the reaper.
    pub(crate) fn add_finalizer(
        &self,
        name: &str,
        fut: BoxFuture<'static, ()>,
    ) -> Result<(), SpawnError> {
        let mut state = self.lock();
        if state.closed {
            return Err(SpawnError::Closed);
        }
        state.finalizers.push(Finalizer {
            name: Arc::from(name),
            fut,
        });
        Ok(())
    }

    /// Rejects any further spawn or finalizer.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of unfinished tasks.
    pub(crate) fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Takes all unfinished tasks, ordered by spawn order.
    pub(crate) fn drain(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.lock().tasks.drain().map(|(_, e)| e).collect();
        entries.sort_unstable_by_key(|e| e.id);
        entries
    }

    /// Takes the registered finalizers, in registration order.
    pub(crate) fn take_finalizers(&self) -> Vec<Finalizer> {
        std::mem::take(&mut self.lock().finalizers)
    }

    fn remove(&self, id: TaskId) {
        self.lock().tasks.remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lives inside the task wrapper; runs on every exit path of the wrapper.
struct ExitGuard {
    id: TaskId,
    cell: Arc<TaskCell>,
    registry: Weak<Registry>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        // no-op if the wrapper already recorded an outcome
        self.cell.cancel();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
