//! Scheduler background loop.
//!
//! Spawns a tokio task that pulls one task at a time from the shared
//! [`TaskQueue`] and races its execution against a watchdog and the task's
//! cancellation token. Exactly one terminal hook runs per task: `finish` on
//! normal completion, `cancel` on preemption, watchdog expiry, external
//! cancellation, failure or panic. Nothing a task does can end the loop; only
//! the shutdown token can.

use crate::actor::ActorContext;
use crate::config::SchedulerConfig;
use crate::scheduler::queue::{Claimed, TaskQueue};
use crate::scheduler::task::{BoxedTask, TaskDescriptor};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Capacity of the scheduler event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Why a task was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A priority insertion displaced it.
    Preempted,
    /// It exceeded its watchdog ceiling.
    Watchdog,
    /// Someone called `cancel_current`.
    External,
    /// The actor is shutting down.
    Shutdown,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preempted => write!(f, "preempted"),
            Self::Watchdog => write!(f, "watchdog"),
            Self::External => write!(f, "external"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Lifecycle notifications published by the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// A task became current.
    Started {
        /// The task.
        task: TaskDescriptor,
    },
    /// A task completed and its `finish` hook ran.
    Finished {
        /// The task.
        task: TaskDescriptor,
        /// Time spent executing.
        elapsed: Duration,
    },
    /// A task was interrupted and its `cancel` hook ran.
    Cancelled {
        /// The task.
        task: TaskDescriptor,
        /// What interrupted it.
        reason: CancelReason,
    },
    /// A task errored or panicked; its `cancel` hook ran.
    Failed {
        /// The task.
        task: TaskDescriptor,
        /// Error or panic message.
        error: String,
    },
}

enum Outcome {
    Completed,
    Interrupted,
    TimedOut,
    Failed(String),
}

/// Single-consumer loop executing actor tasks one at a time.
pub struct Scheduler {
    queue: Arc<TaskQueue>,
    ctx: ActorContext,
    config: SchedulerConfig,
    events: broadcast::Sender<SchedulerEvent>,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler draining `queue` against the given collaborators.
    pub fn new(queue: Arc<TaskQueue>, ctx: ActorContext, config: SchedulerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            queue,
            ctx,
            config,
            events,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop the loop (and cancel the current task) when `token` fires.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Receive lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Sender side of the event channel, for handing out more receivers later.
    pub fn event_sender(&self) -> broadcast::Sender<SchedulerEvent> {
        self.events.clone()
    }

    /// Start the scheduler background loop.
    pub fn run(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run_loop().await })
    }

    async fn run_loop(self) {
        info!("actor scheduler started");
        let recheck = Duration::from_millis(self.config.idle_recheck_ms.max(1));

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.queue.take_next(&self.shutdown) {
                Some(claimed) => self.run_one(claimed).await,
                None => {
                    tokio::select! {
                        () = self.shutdown.cancelled() => break,
                        () = self.queue.wait_for_work() => {}
                        () = tokio::time::sleep(recheck) => {}
                    }
                }
            }
        }

        info!("actor scheduler stopped");
    }

    /// Execute one claimed task to its terminal hook.
    async fn run_one(&self, claimed: Claimed) {
        let Claimed {
            seq,
            mut task,
            cancel,
        } = claimed;
        let descriptor = task.descriptor();
        let watchdog = self.config.watchdog_for(descriptor.kind);
        debug!(task = %descriptor, ?watchdog, "executing actor task");
        self.publish(SchedulerEvent::Started {
            task: descriptor.clone(),
        });

        let started_at = Instant::now();
        let outcome = {
            let execution = AssertUnwindSafe(task.execute(&self.ctx, &cancel)).catch_unwind();
            tokio::select! {
                biased;
                () = cancel.cancelled() => Outcome::Interrupted,
                result = execution => match result {
                    Ok(Ok(())) => Outcome::Completed,
                    Ok(Err(e)) if e.is_cancelled() => Outcome::Interrupted,
                    Ok(Err(e)) => Outcome::Failed(e.to_string()),
                    Err(panic) => Outcome::Failed(panic_message(panic.as_ref())),
                },
                () = tokio::time::sleep(watchdog) => Outcome::TimedOut,
            }
        };

        // Sub-activities spawned by the task must not outlive it.
        cancel.cancel();

        match outcome {
            Outcome::Completed => {
                self.terminal_hook(&mut task, &descriptor, Hook::Finish);
                self.queue.release(seq);
                self.publish(SchedulerEvent::Finished {
                    task: descriptor,
                    elapsed: started_at.elapsed(),
                });
            }
            Outcome::TimedOut => {
                debug!(task = %descriptor, ?watchdog, "watchdog expired, cancelling task");
                self.terminal_hook(&mut task, &descriptor, Hook::Cancel);
                self.queue.release(seq);
                self.publish(SchedulerEvent::Cancelled {
                    task: descriptor,
                    reason: CancelReason::Watchdog,
                });
            }
            Outcome::Interrupted => {
                self.terminal_hook(&mut task, &descriptor, Hook::Cancel);
                let release = self.queue.release(seq);
                let reason = if self.shutdown.is_cancelled() {
                    CancelReason::Shutdown
                } else if release.preempted {
                    CancelReason::Preempted
                } else {
                    CancelReason::External
                };
                debug!(task = %descriptor, %reason, "task cancelled");
                if reason == CancelReason::Preempted && self.config.requeue_preempted {
                    if let Some(fresh) = task.respawn() {
                        self.queue.requeue(fresh, release.urgent_ahead);
                    }
                }
                self.publish(SchedulerEvent::Cancelled {
                    task: descriptor,
                    reason,
                });
            }
            Outcome::Failed(message) => {
                error!(task = %descriptor, error = %message, "actor task failed, treating as cancelled");
                self.terminal_hook(&mut task, &descriptor, Hook::Cancel);
                self.queue.release(seq);
                self.publish(SchedulerEvent::Failed {
                    task: descriptor,
                    error: message,
                });
            }
        }
    }

    fn terminal_hook(&self, task: &mut BoxedTask, descriptor: &TaskDescriptor, hook: Hook) {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| match hook {
            Hook::Finish => task.finish(&self.ctx),
            Hook::Cancel => task.cancel(&self.ctx),
        }));
        if let Err(panic) = result {
            error!(
                task = %descriptor,
                ?hook,
                error = %panic_message(panic.as_ref()),
                "task terminal hook panicked"
            );
        }
    }

    fn publish(&self, event: SchedulerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    Finish,
    Cancel,
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_owned()
    }
}
