//! # Handles to tasks spawned on the [`Scheduler`](crate::Scheduler).
//!
//! Every spawned task gets a process-unique [`TaskId`] and a shared status cell.
//! The cell is written from inside the task wrapper and read by the owner of the
//! [`TaskHandle`] and by the shutdown reaper:
//!
//! ```text
//! Running ──► Completed   (future returned)
//!         ├─► Failed      (future panicked; message kept)
//!         └─► Cancelled   (future dropped before completion)
//! ```
//!
//! The transition out of `Running` happens once. Dropping the wrapper while still
//! `Running` (token cancellation of an abortable task, a forced abort, runtime
//! release) records `Cancelled`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(TASK_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Observable state of a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Still scheduled.
    Running,
    /// Returned a value.
    Completed,
    /// Panicked.
    Failed,
    /// Dropped before completion.
    Cancelled,
}

impl TaskState {
    /// Returns `true` for every state but [`TaskState::Running`].
    pub fn is_finished(self) -> bool {
        !matches!(self, TaskState::Running)
    }
}

#[derive(Debug, Clone)]
enum Status {
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

/// Status cell shared between a task wrapper, its handle and the registry.
#[derive(Debug)]
pub(crate) struct TaskCell {
    status: Mutex<Status>,
}

impl TaskCell {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(Status::Running),
        })
    }

    pub(crate) fn state(&self) -> TaskState {
        match &*self.lock() {
            Status::Running => TaskState::Running,
            Status::Completed => TaskState::Completed,
            Status::Failed(_) => TaskState::Failed,
            Status::Cancelled => TaskState::Cancelled,
        }
    }

    /// Panic message of a failed task.
    pub(crate) fn failure(&self) -> Option<String> {
        match &*self.lock() {
            Status::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    pub(crate) fn complete(&self) {
        self.transition(Status::Completed);
    }

    pub(crate) fn fail(&self, message: String) {
        self.transition(Status::Failed(message));
    }

    pub(crate) fn cancel(&self) {
        self.transition(Status::Cancelled);
    }

    fn transition(&self, to: Status) {
        let mut status = self.lock();
        if matches!(*status, Status::Running) {
            *status = to;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a task wrapper delivers to its handle.
pub(crate) type Delivery<T> = Result<T, Box<dyn std::any::Any + Send + 'static>>;

/// Owned handle to a task spawned on the scheduler.
///
/// Awaiting the handle yields the task's value, [`TaskError::Cancelled`] if it was
/// dropped before completion, or [`TaskError::Panicked`] with the original payload.
/// Dropping the handle detaches the task; it keeps running and stays visible to
/// the shutdown reaper.
pub struct TaskHandle<T> {
    id: TaskId,
    name: Arc<str>,
    cell: Arc<TaskCell>,
    token: CancellationToken,
    rx: oneshot::Receiver<Delivery<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(
        id: TaskId,
        name: Arc<str>,
        cell: Arc<TaskCell>,
        token: CancellationToken,
        rx: oneshot::Receiver<Delivery<T>>,
    ) -> Self {
        Self {
            id,
            name,
            cell,
            token,
            rx,
        }
    }

    /// Task identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Task name given at spawn time.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.cell.state()
    }

    /// Returns `true` once the task left [`TaskState::Running`].
    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Requests cancellation.
    ///
    /// Abortable tasks are dropped at their next suspension point; cooperative
    /// tasks observe their token and decide how to finish.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(Err(payload))) => Poll::Ready(Err(TaskError::panicked(payload))),
            // sender dropped without delivering: the wrapper was torn down early
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Cancelled)),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
