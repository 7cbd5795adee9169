//! Runtime core: lifecycle, supervision and shutdown of one invocation.
//!
//! The public surface of this module is [`Runner`] (with [`RunnerBuilder`] and
//! [`Config`]) plus the handles the entrypoint receives: [`Termination`] and
//! [`Scheduler`].
//!
//! Internal modules:
//! - [`lifecycle`]: acquire/release the tokio runtime of one invocation;
//! - [`signals`]: OS signals → termination, with LIFO handler restore;
//! - [`supervisor`]: races the entrypoint against termination, applies the exit timeout;
//! - [`reaper`]: cancels leftovers, reports their failures, releases owned resources;
//! - [`registry`]: live tasks and finalizers spawned through the scheduler;
//! - [`runner`]: wires the above into one invocation.

mod builder;
mod config;
mod lifecycle;
mod reaper;
mod registry;
mod runner;
mod scheduler;
mod signals;
mod supervisor;
mod termination;

pub use builder::RunnerBuilder;
pub use config::Config;
pub use lifecycle::{CurrentThread, SchedulerFactory};
pub use runner::{run, Runner, ENTRYPOINT_TASK};
pub use scheduler::Scheduler;
pub use signals::SignalKind;
pub use termination::Termination;
