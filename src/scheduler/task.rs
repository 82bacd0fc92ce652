//! The task contract shared by every unit of actor work.
//!
//! A task is executed at most once by the scheduler loop and then receives
//! exactly one terminal call: [`ActorTask::finish`] when its execution
//! completed, or [`ActorTask::cancel`] when it was preempted, timed out or
//! failed. Implementations must make both calls idempotent and must stop
//! producing side effects once either has run.

use crate::actor::ActorContext;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Broad category of a task, used for watchdog selection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Walk somewhere.
    Move,
    /// Say something.
    Dialogue,
    /// Short one-shot animation such as watering.
    IdleAction,
    /// Anything defined outside this crate.
    Custom,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Move => write!(f, "move"),
            Self::Dialogue => write!(f, "dialogue"),
            Self::IdleAction => write!(f, "idle_action"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Read-only description of a task, safe to hand to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Task category.
    pub kind: TaskKind,
    /// Short human-readable summary.
    pub summary: String,
}

impl TaskDescriptor {
    /// Create a descriptor.
    pub fn new(kind: TaskKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
        }
    }
}

impl std::fmt::Display for TaskDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.summary)
    }
}

/// A unit of work the actor performs.
#[async_trait]
pub trait ActorTask: Send {
    /// Describe this task for queue snapshots and events.
    fn descriptor(&self) -> TaskDescriptor;

    /// Run the task until it is done.
    ///
    /// Every concurrent sub-activity must observe `cancel` and return
    /// [`PomoError::Cancelled`](crate::PomoError::Cancelled) once it fires.
    async fn execute(&mut self, ctx: &ActorContext, cancel: &CancellationToken) -> Result<()>;

    /// Revert observable actor state after an interrupted execution.
    fn cancel(&mut self, ctx: &ActorContext);

    /// Normal completion hook.
    fn finish(&mut self, ctx: &ActorContext);

    /// A fresh, unexecuted copy to run again after preemption.
    ///
    /// Tasks that should simply be dropped when preempted return `None`.
    fn respawn(&self) -> Option<BoxedTask> {
        None
    }
}

/// Owned, type-erased task.
pub type BoxedTask = Box<dyn ActorTask>;
