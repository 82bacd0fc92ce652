//! The Pomo actor: collaborator contracts and runtime wiring.
//!
//! The core never talks to an engine directly. Movement, animation and the
//! dialogue bubble are reached through the [`Navigator`], [`Animator`] and
//! [`DialogueDisplay`] traits bundled in an [`ActorContext`]. Only the task
//! currently owned by the scheduler loop touches them.
//!
//! [`PomoActor::spawn`] starts the scheduler loop and (optionally) the
//! self-driving producer, returning an [`ActorHandle`] for input handlers.

pub mod sim;

use crate::clock::{Clock, SystemClock};
use crate::config::{PomoConfig, TaskConfig};
use crate::scheduler::producer::Producer;
use crate::scheduler::queue::{LoopState, TaskQueue};
use crate::scheduler::runner::{Scheduler, SchedulerEvent};
use crate::scheduler::task::{BoxedTask, TaskDescriptor};
use crate::tasks::dialogue::DialogueTask;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A point or vector on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// East-west coordinate.
    pub x: f32,
    /// North-south coordinate.
    pub y: f32,
}

impl Point {
    /// The origin / zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a point.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length when treated as a vector.
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Distance to another point.
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Result of asking the navigation collaborator for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    /// The destination can be reached.
    Complete,
    /// Only part of the way can be travelled.
    Partial,
    /// No path exists.
    Invalid,
}

/// Navigation collaborator (path finding and locomotion).
pub trait Navigator: Send + Sync {
    /// Compute a path to `destination` without starting to move.
    fn calculate_path(&self, destination: Point) -> PathStatus;
    /// Start moving toward `destination`.
    fn set_destination(&self, destination: Point);
    /// Stop moving and drop the current path.
    fn reset_path(&self);
    /// Current actor position.
    fn position(&self) -> Point;
    /// Distance left on the current path.
    fn remaining_distance(&self) -> f32;
    /// Distance at which the agent counts as arrived.
    fn stopping_distance(&self) -> f32;
    /// Whether a path request is still being computed.
    fn path_pending(&self) -> bool;
    /// Whether the agent currently holds a path.
    fn has_path(&self) -> bool;
    /// Current velocity.
    fn velocity(&self) -> Point;
}

/// One-shot animation signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationTrigger {
    /// Wave at the player.
    Greet,
    /// Water the crops.
    Water,
}

/// Animation collaborator.
pub trait Animator: Send + Sync {
    /// Set the "is moving" flag.
    fn set_moving(&self, moving: bool);
    /// Set the two movement-axis parameters.
    fn set_axes(&self, x: f32, y: f32);
    /// Fire a one-shot trigger.
    fn trigger(&self, trigger: AnimationTrigger);
}

/// Dialogue bubble collaborator.
pub trait DialogueDisplay: Send + Sync {
    /// Open the container.
    fn show(&self);
    /// Close the container.
    fn hide(&self);
    /// Append text to what is displayed.
    fn append(&self, text: &str);
    /// Remove all displayed text.
    fn clear(&self);
}

/// Everything a task may act on.
#[derive(Clone)]
pub struct ActorContext {
    /// Path finding and locomotion.
    pub navigator: Arc<dyn Navigator>,
    /// Animation parameters and triggers.
    pub animator: Arc<dyn Animator>,
    /// Speech bubble.
    pub dialogue: Arc<dyn DialogueDisplay>,
}

impl ActorContext {
    /// Bundle the three collaborators.
    pub fn new(
        navigator: Arc<dyn Navigator>,
        animator: Arc<dyn Animator>,
        dialogue: Arc<dyn DialogueDisplay>,
    ) -> Self {
        Self {
            navigator,
            animator,
            dialogue,
        }
    }
}

impl std::fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("position", &self.navigator.position())
            .finish_non_exhaustive()
    }
}

/// Builder for one running actor.
pub struct PomoActor {
    ctx: ActorContext,
    config: PomoConfig,
    clock: Arc<dyn Clock>,
    autonomous: bool,
    seed: Option<u64>,
}

impl PomoActor {
    /// Create an actor that produces autonomous behaviour by default.
    pub fn new(ctx: ActorContext, config: PomoConfig) -> Self {
        Self {
            ctx,
            config,
            clock: Arc::new(SystemClock),
            autonomous: true,
            seed: None,
        }
    }

    /// Use a different wall clock for time-of-day dialogue.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Only run tasks pushed through the handle.
    pub fn without_producer(mut self) -> Self {
        self.autonomous = false;
        self
    }

    /// Seed the producer's random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Start the scheduler loop (and producer) on the current tokio runtime.
    pub fn spawn(self) -> ActorHandle {
        let queue = Arc::new(TaskQueue::with_soft_capacity(
            self.config.producer.soft_capacity,
        ));
        let shutdown = CancellationToken::new();

        let scheduler = Scheduler::new(
            Arc::clone(&queue),
            self.ctx.clone(),
            self.config.scheduler.clone(),
        )
        .with_shutdown(shutdown.clone());
        let events = scheduler.event_sender();
        let scheduler_task = scheduler.run();

        let producer_task = if self.autonomous {
            let mut producer = Producer::new(
                Arc::clone(&queue),
                self.ctx.clone(),
                Arc::clone(&self.clock),
                &self.config,
            );
            if let Some(seed) = self.seed {
                producer = producer.with_seed(seed);
            }
            Some(producer.run(shutdown.child_token()))
        } else {
            None
        };

        info!(autonomous = self.autonomous, "pomo actor spawned");

        ActorHandle {
            queue,
            tasks: self.config.tasks,
            shutdown,
            events,
            scheduler: scheduler_task,
            producer: producer_task,
        }
    }
}

/// Input-side handle to a running actor.
pub struct ActorHandle {
    queue: Arc<TaskQueue>,
    tasks: TaskConfig,
    shutdown: CancellationToken,
    events: broadcast::Sender<SchedulerEvent>,
    scheduler: JoinHandle<()>,
    producer: Option<JoinHandle<()>>,
}

impl ActorHandle {
    /// Append a task behind everything already pending.
    pub fn enqueue(&self, task: BoxedTask) {
        self.queue.enqueue(task);
    }

    /// Preempt the current task and run `task` next.
    pub fn interrupt(&self, task: BoxedTask) {
        self.queue.insert_front(task);
    }

    /// React to the player tapping the actor: greet and say `line`.
    pub fn interact(&self, line: impl Into<String>) {
        self.interrupt(Box::new(DialogueTask::greeting(line, &self.tasks)));
    }

    /// Ask the current task to stop without replacing it.
    pub fn cancel_current(&self) -> bool {
        self.queue.cancel_current()
    }

    /// Ordered descriptors of pending tasks.
    pub fn peek_queue(&self) -> Vec<TaskDescriptor> {
        self.queue.peek()
    }

    /// Descriptor of the task being executed, if any.
    pub fn current(&self) -> Option<TaskDescriptor> {
        self.queue.current()
    }

    /// Whether the loop is idle or running a task.
    pub fn state(&self) -> LoopState {
        self.queue.state()
    }

    /// Receive scheduler lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Cancel the current task, stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.scheduler.await {
            warn!("scheduler task ended abnormally: {e}");
        }
        if let Some(producer) = self.producer {
            if let Err(e) = producer.await {
                warn!("producer task ended abnormally: {e}");
            }
        }
        info!("pomo actor stopped");
    }
}
