//! Executor slot of one scheduler.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ExecutorError;

use super::{Executor, ThreadPool};

enum Slot {
    /// Nothing bound yet; a default pool is created on first use.
    Empty,
    Bound {
        executor: Arc<dyn Executor>,
        owned: bool,
    },
    /// Unbound by the reaper; offload is no longer possible.
    Released,
}

/// Binds at most one executor to the scheduler for the invocation.
pub(crate) struct ExecutorBinding {
    slot: Mutex<Slot>,
    default_threads: usize,
}

impl ExecutorBinding {
    /// Binding with a caller-owned executor.
    pub(crate) fn external(executor: Arc<dyn Executor>) -> Self {
        Self {
            slot: Mutex::new(Slot::Bound {
                executor,
                owned: false,
            }),
            default_threads: 0,
        }
    }

    /// Binding that creates its own pool of `threads` workers on demand (`0` = available parallelism).
    pub(crate) fn lazy(threads: usize) -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            default_threads: threads,
        }
    }

    /// Returns the bound executor, starting the default pool if needed.
    pub(crate) fn get(&self) -> Result<Arc<dyn Executor>, ExecutorError> {
        let mut slot = self.lock();
        match &*slot {
            Slot::Bound { executor, .. } => return Ok(Arc::clone(executor)),
            Slot::Released => return Err(ExecutorError::Unbound),
            Slot::Empty => {}
        }

        let pool = match self.default_threads {
            0 => ThreadPool::with_default_size(),
            n => ThreadPool::new(n),
        }
        .map_err(|e| ExecutorError::Start {
            message: e.to_string(),
        })?;
        tracing::debug!(threads = pool.size(), "default executor started");

        let executor: Arc<dyn Executor> = Arc::new(pool);
        *slot = Slot::Bound {
            executor: Arc::clone(&executor),
            owned: true,
        };
        Ok(executor)
    }

    /// Unbinds the executor and returns it if this binding owns it.
    ///
    /// The caller is responsible for shutting an owned executor down.
    pub(crate) fn release(&self) -> Option<Arc<dyn Executor>> {
        match std::mem::replace(&mut *self.lock(), Slot::Released) {
            Slot::Bound {
                executor,
                owned: true,
            } => Some(executor),
            Slot::Bound { owned: false, .. } => {
                tracing::debug!("external executor unbound");
                None
            }
            Slot::Empty | Slot::Released => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ExecutorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.lock() {
            Slot::Empty => "empty",
            Slot::Bound { owned: true, .. } => "owned",
            Slot::Bound { owned: false, .. } => "external",
            Slot::Released => "released",
        };
        f.debug_struct("ExecutorBinding").field("slot", &state).finish()
    }
}
