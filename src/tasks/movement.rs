//! Walk the actor to a destination.

use crate::actor::{ActorContext, Navigator, PathStatus, Point};
use crate::config::TaskConfig;
use crate::error::{PomoError, Result};
use crate::scheduler::task::{ActorTask, BoxedTask, TaskDescriptor, TaskKind};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Whether the navigator considers the agent to have arrived.
///
/// Arrived means: no path computation pending, within stopping distance, and
/// either no path left or standing still.
pub fn has_arrived(navigator: &dyn Navigator) -> bool {
    !navigator.path_pending()
        && navigator.remaining_distance() <= navigator.stopping_distance()
        && (!navigator.has_path() || navigator.velocity().length() <= f32::EPSILON)
}

/// Moves the actor to a reachable point.
#[derive(Debug)]
pub struct MoveTask {
    destination: Point,
    poll: Duration,
    frame: Duration,
    settled: bool,
}

impl MoveTask {
    /// Build a move task after checking the destination has a complete path.
    ///
    /// # Errors
    ///
    /// Returns [`PomoError::Unreachable`] for `Partial` or `Invalid` paths.
    pub fn plan(navigator: &dyn Navigator, destination: Point, config: &TaskConfig) -> Result<Self> {
        match navigator.calculate_path(destination) {
            PathStatus::Complete => Ok(Self {
                destination,
                poll: super::period(config.move_poll_ms),
                frame: super::period(config.animation_frame_ms),
                settled: false,
            }),
            status => {
                debug!(?destination, ?status, "rejecting move to unreachable point");
                Err(PomoError::Unreachable {
                    x: destination.x,
                    y: destination.y,
                })
            }
        }
    }

    /// Where the actor is heading.
    pub fn destination(&self) -> Point {
        self.destination
    }

    fn settle(&mut self, ctx: &ActorContext) {
        if self.settled {
            return;
        }
        self.settled = true;
        ctx.navigator.reset_path();
        ctx.animator.set_moving(false);
        ctx.animator.set_axes(0.0, 0.0);
    }
}

#[async_trait]
impl ActorTask for MoveTask {
    fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor::new(
            TaskKind::Move,
            format!("to ({:.1}, {:.1})", self.destination.x, self.destination.y),
        )
    }

    async fn execute(&mut self, ctx: &ActorContext, cancel: &CancellationToken) -> Result<()> {
        if self.settled || cancel.is_cancelled() {
            return Err(PomoError::Cancelled);
        }
        ctx.navigator.set_destination(self.destination);
        ctx.animator.set_moving(true);

        let mut poll = tokio::time::interval(self.poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frame = tokio::time::interval(self.frame);
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = ctx.navigator.position();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PomoError::Cancelled),
                _ = poll.tick() => {
                    if has_arrived(ctx.navigator.as_ref()) {
                        return Ok(());
                    }
                }
                _ = frame.tick() => {
                    let here = ctx.navigator.position();
                    let heading = (here - last).normalized();
                    ctx.animator.set_axes(heading.x, heading.y);
                    last = here;
                }
            }
        }
    }

    fn cancel(&mut self, ctx: &ActorContext) {
        self.settle(ctx);
    }

    fn finish(&mut self, ctx: &ActorContext) {
        self.settle(ctx);
    }

    fn respawn(&self) -> Option<BoxedTask> {
        Some(Box::new(Self {
            destination: self.destination,
            poll: self.poll,
            frame: self.frame,
            settled: false,
        }))
    }
}
