//! Task abstractions: the supervised [`Entrypoint`] and handles to tasks it spawns.

mod entrypoint;
mod handle;

pub use entrypoint::Entrypoint;
pub use handle::{TaskHandle, TaskId, TaskState};

pub(crate) use handle::TaskCell;
