//! One-shot idle animations such as watering the crops.

use crate::actor::{ActorContext, AnimationTrigger};
use crate::config::TaskConfig;
use crate::error::{PomoError, Result};
use crate::scheduler::task::{ActorTask, BoxedTask, TaskDescriptor, TaskKind};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fires an animation trigger and holds the actor for a short while.
#[derive(Debug, Clone)]
pub struct IdleActionTask {
    trigger: AnimationTrigger,
    duration: Duration,
    done: bool,
}

impl IdleActionTask {
    /// Fire `trigger` and occupy the actor for `duration`.
    pub fn new(trigger: AnimationTrigger, duration: Duration) -> Self {
        Self {
            trigger,
            duration,
            done: false,
        }
    }

    /// Water the crops.
    pub fn watering(config: &TaskConfig) -> Self {
        Self::new(
            AnimationTrigger::Water,
            Duration::from_millis(config.idle_action_ms),
        )
    }
}

#[async_trait]
impl ActorTask for IdleActionTask {
    fn descriptor(&self) -> TaskDescriptor {
        let summary = match self.trigger {
            AnimationTrigger::Water => "water crops",
            AnimationTrigger::Greet => "greet",
        };
        TaskDescriptor::new(TaskKind::IdleAction, summary)
    }

    async fn execute(&mut self, ctx: &ActorContext, cancel: &CancellationToken) -> Result<()> {
        if self.done || cancel.is_cancelled() {
            return Err(PomoError::Cancelled);
        }
        ctx.animator.trigger(self.trigger);
        tokio::select! {
            () = cancel.cancelled() => Err(PomoError::Cancelled),
            () = tokio::time::sleep(self.duration) => Ok(()),
        }
    }

    // The trigger is one-shot; there is nothing to revert.
    fn cancel(&mut self, _ctx: &ActorContext) {
        self.done = true;
    }

    fn finish(&mut self, _ctx: &ActorContext) {
        self.done = true;
    }

    fn respawn(&self) -> Option<BoxedTask> {
        Some(Box::new(Self::new(self.trigger, self.duration)))
    }
}
