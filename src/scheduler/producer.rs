//! Self-driving producer keeping the actor busy.
//!
//! Once per interval, while the queue is below its soft capacity, the
//! producer appends either a wander to a random reachable point or a line of
//! time-of-day chatter. On an independent randomized timer it appends an
//! idle action (watering) that ignores the capacity bound.

use crate::actor::{ActorContext, PathStatus, Point};
use crate::clock::Clock;
use crate::config::{PomoConfig, ProducerConfig, TaskConfig};
use crate::scheduler::dialogue_table::{DayPeriod, DialogueTable};
use crate::scheduler::queue::TaskQueue;
use crate::scheduler::task::{ActorTask, BoxedTask, TaskDescriptor};
use crate::tasks::{DialogueTask, IdleActionTask, MoveTask};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Generates autonomous actor tasks.
pub struct Producer {
    queue: Arc<TaskQueue>,
    ctx: ActorContext,
    clock: Arc<dyn Clock>,
    config: ProducerConfig,
    tasks: TaskConfig,
    dialogue: DialogueTable,
    rng: StdRng,
}

impl Producer {
    /// Create a producer feeding `queue`.
    pub fn new(
        queue: Arc<TaskQueue>,
        ctx: ActorContext,
        clock: Arc<dyn Clock>,
        config: &PomoConfig,
    ) -> Self {
        Self {
            queue,
            ctx,
            clock,
            config: config.producer.clone(),
            tasks: config.tasks.clone(),
            dialogue: config.dialogue.clone(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Make sampling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// One generation attempt. Returns what was enqueued, if anything.
    pub fn produce_once(&mut self) -> Option<TaskDescriptor> {
        if !self.queue.has_capacity() {
            return None;
        }

        let task: BoxedTask = if self.rng.gen_bool(self.config.move_probability) {
            match self.sample_destination() {
                Some(task) => Box::new(task),
                None => {
                    warn!(
                        attempts = self.config.max_destination_attempts,
                        "no reachable wander destination, idling instead"
                    );
                    Box::new(IdleActionTask::watering(&self.tasks))
                }
            }
        } else {
            let period = DayPeriod::from_hour(self.clock.local_hour());
            match self.dialogue.pick(period, &mut self.rng) {
                Some(line) => Box::new(DialogueTask::new(line, &self.tasks)),
                None => {
                    debug!(%period, "no dialogue lines for period");
                    return None;
                }
            }
        };

        let descriptor = task.descriptor();
        match self.queue.try_enqueue(task) {
            Ok(()) => {
                debug!(task = %descriptor, "producer enqueued task");
                Some(descriptor)
            }
            Err(_) => None,
        }
    }

    /// Append a watering action regardless of capacity.
    pub fn schedule_idle_action(&self) -> TaskDescriptor {
        let task = IdleActionTask::watering(&self.tasks);
        let descriptor = task.descriptor();
        self.queue.enqueue(Box::new(task));
        debug!(task = %descriptor, "producer enqueued idle action");
        descriptor
    }

    /// Draw the delay until the next idle action.
    pub fn next_idle_delay(&mut self) -> Duration {
        let min = self.config.idle_action_min_secs;
        let max = self.config.idle_action_max_secs.max(min);
        Duration::from_secs(self.rng.gen_range(min..=max))
    }

    /// Rejection-sample a reachable point within the wander ring.
    ///
    /// Gives up after `max_destination_attempts` unreachable candidates.
    pub fn sample_destination(&mut self) -> Option<MoveTask> {
        let origin = self.ctx.navigator.position();
        let min = self.config.min_radius;
        let max = self.config.max_radius.max(min);

        for attempt in 1..=self.config.max_destination_attempts {
            let angle = self.rng.gen_range(0.0..TAU);
            let radius = if max > min {
                self.rng.gen_range(min..=max)
            } else {
                min
            };
            let candidate = origin + Point::new(angle.cos(), angle.sin()) * radius;
            if self.ctx.navigator.calculate_path(candidate) != PathStatus::Complete {
                debug!(attempt, ?candidate, "wander destination unreachable, resampling");
                continue;
            }
            if let Ok(task) = MoveTask::plan(self.ctx.navigator.as_ref(), candidate, &self.tasks) {
                return Some(task);
            }
        }
        None
    }

    /// Run until `cancel` fires.
    pub fn run(mut self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_ms = self.config.interval_ms,
                soft_capacity = self.queue.soft_capacity(),
                "producer started"
            );
            let mut interval =
                tokio::time::interval(Duration::from_millis(self.config.interval_ms.max(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let idle = tokio::time::sleep(self.next_idle_delay());
            tokio::pin!(idle);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.produce_once();
                    }
                    () = &mut idle => {
                        self.schedule_idle_action();
                        let next = self.next_idle_delay();
                        idle.as_mut().reset(Instant::now() + next);
                    }
                }
            }
            info!("producer stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::actor::sim::{Grid, SimAnimator, SimDialogue, SimNavigator};
    use crate::clock::ManualClock;
    use crate::scheduler::task::TaskKind;
    use chrono::TimeZone;

    fn producer(grid: Grid, config: PomoConfig) -> (Producer, Arc<TaskQueue>) {
        let queue = Arc::new(TaskQueue::with_soft_capacity(config.producer.soft_capacity));
        let ctx = ActorContext::new(
            Arc::new(SimNavigator::new(grid, Point::new(10.0, 10.0), 2.0)),
            Arc::new(SimAnimator::new()),
            Arc::new(SimDialogue::new()),
        );
        let clock = Arc::new(ManualClock::new(
            chrono::Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        clock.set_local_hour(20);
        let producer = Producer::new(Arc::clone(&queue), ctx, clock, &config).with_seed(42);
        (producer, queue)
    }

    fn config_with(move_probability: f64) -> PomoConfig {
        let mut config = PomoConfig::default();
        config.producer.move_probability = move_probability;
        config
    }

    #[test]
    fn stops_at_soft_capacity() {
        let (mut producer, queue) = producer(Grid::new(20, 20), config_with(0.9));
        for _ in 0..10 {
            producer.produce_once();
        }
        assert_eq!(queue.len(), 3);
        assert!(producer.produce_once().is_none());
    }

    #[test]
    fn idle_actions_ignore_capacity() {
        let (mut producer, queue) = producer(Grid::new(20, 20), config_with(1.0));
        while producer.produce_once().is_some() {}
        assert_eq!(queue.len(), 3);

        let d = producer.schedule_idle_action();
        assert_eq!(d.kind, TaskKind::IdleAction);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn sampled_destinations_are_reachable_and_within_ring() {
        let grid = Grid::new(20, 20).block(12, 10).block(8, 10);
        let (mut producer, _queue) = producer(grid.clone(), config_with(1.0));
        for _ in 0..100 {
            let task = producer.sample_destination().unwrap();
            let dest = task.destination();
            assert!(grid.is_walkable(dest));
            let r = dest.distance(Point::new(10.0, 10.0));
            assert!((2.0 - 1e-3..=6.0 + 1e-3).contains(&r), "radius {r}");
        }
    }

    #[test]
    fn exhausted_sampling_falls_back_to_idle_action() {
        // Every candidate lands outside a 1x1 field.
        let (mut producer, queue) = producer(Grid::new(1, 1), config_with(1.0));
        assert!(producer.sample_destination().is_none());

        let d = producer.produce_once().unwrap();
        assert_eq!(d.kind, TaskKind::IdleAction);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn chatter_uses_the_current_day_period() {
        let (mut producer, queue) = producer(Grid::new(20, 20), config_with(0.0));
        producer.produce_once().unwrap();

        let evening = DialogueTable::default().evening;
        let summary = queue.peek()[0].summary.clone();
        assert!(
            evening
                .iter()
                .any(|line| summary.contains(&line.chars().take(20).collect::<String>())),
            "{summary} is not an evening line"
        );
    }

    #[test]
    fn idle_delay_stays_in_range() {
        let (mut producer, _queue) = producer(Grid::new(4, 4), PomoConfig::default());
        for _ in 0..50 {
            let d = producer.next_idle_delay();
            assert!(d >= Duration::from_secs(20) && d <= Duration::from_secs(60));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_fills_queue_and_stops_on_cancel() {
        let mut config = config_with(1.0);
        config.producer.idle_action_min_secs = 5;
        config.producer.idle_action_max_secs = 5;
        let (producer, queue) = producer(Grid::new(20, 20), config);
        let cancel = CancellationToken::new();
        let handle = producer.run(cancel.clone());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(queue.len(), 3);
        assert!(queue.peek().iter().all(|d| d.kind == TaskKind::Move));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.peek()[3].kind, TaskKind::IdleAction);

        cancel.cancel();
        handle.await.unwrap();
    }
}
