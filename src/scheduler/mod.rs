//! Single-actor cooperative task scheduler.
//!
//! Tasks enter a [`TaskQueue`] either at the tail (autonomous behaviour from
//! the [`producer::Producer`]) or at the head (user interaction, which also
//! preempts whatever is running). A [`Scheduler`] loop executes them strictly
//! one at a time under a watchdog.

pub mod dialogue_table;
pub mod producer;
pub mod queue;
pub mod runner;
pub mod task;

pub use queue::{LoopState, TaskQueue};
pub use runner::{CancelReason, Scheduler, SchedulerEvent};
pub use task::{ActorTask, BoxedTask, TaskDescriptor, TaskKind};
