//! # ThreadPool: blocking pool backed by a dedicated tokio runtime.
//!
//! Jobs go through [`Runtime::spawn_blocking`] of a runtime owned by the pool, so
//! they never share threads with the invocation's scheduler. At most `size` jobs
//! run at once; further ones wait in tokio's blocking queue.
//!
//! `shutdown()` stops accepting jobs and drops the runtime, which waits for the
//! running jobs to return. Jobs still queued at that point are discarded.

use std::fmt;
use std::io;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use tokio::runtime::{Builder, Runtime};

use crate::error::{panic_message, ExecutorError};

use super::{Executor, Job};

/// Fixed-size blocking pool.
pub struct ThreadPool {
    size: usize,
    runtime: Mutex<Option<Runtime>>,
}

impl ThreadPool {
    /// Starts a pool running at most `size` jobs at once (at least one).
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size)
            .thread_name("runvisor-blocking")
            .build()?;

        Ok(Self {
            size,
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Starts a pool sized to the available parallelism.
    pub fn with_default_size() -> io::Result<Self> {
        let size = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::new(size)
    }

    /// Maximum number of jobs running at once.
    pub fn size(&self) -> usize {
        self.size
    }

    fn lock(&self) -> MutexGuard<'_, Option<Runtime>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Executor for ThreadPool {
    fn execute(&self, job: Job) -> Result<(), ExecutorError> {
        let guard = self.lock();
        let Some(runtime) = guard.as_ref() else {
            return Err(ExecutorError::Shutdown);
        };
        runtime.spawn_blocking(move || {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                tracing::warn!(
                    panic = %panic_message(payload.as_ref()),
                    "blocking job panicked"
                );
            }
        });
        Ok(())
    }

    /// Must be called where blocking is allowed: outside any runtime, or from
    /// `spawn_blocking`. Calling it from one of the pool's own jobs never returns.
    fn shutdown(&self) {
        // taken under the lock, dropped outside it: execute() fails fast meanwhile
        let runtime = self.lock().take();
        drop(runtime);
    }

    fn is_shutdown(&self) -> bool {
        self.lock().is_none()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // never blocks: the last reference may go away inside an async context
        if let Some(runtime) = self.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("size", &self.size)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
