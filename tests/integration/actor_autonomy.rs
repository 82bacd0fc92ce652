//! The self-driving producer keeps an otherwise idle actor busy.

use crate::helpers::{drain_events, run_for, sim_rig};
use pomo::actor::Point;
use pomo::clock::ManualClock;
use pomo::config::PomoConfig;
use pomo::{PomoActor, SchedulerEvent, TaskKind};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn producer_drives_actor_without_input() {
    let rig = sim_rig(Point::new(10.0, 10.0));
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    clock.set_local_hour(7);
    let actor = PomoActor::new(rig.ctx.clone(), PomoConfig::default())
        .with_clock(clock)
        .with_seed(2026)
        .spawn();
    let mut events = actor.subscribe();

    for _ in 0..20 {
        run_for(Duration::from_millis(500)).await;
        assert!(actor.peek_queue().len() <= 3);
    }

    let started: Vec<TaskKind> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SchedulerEvent::Started { task } => Some(task.kind),
            _ => None,
        })
        .collect();
    assert!(started.len() >= 3);
    assert!(started.contains(&TaskKind::Move));

    actor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn idle_action_bypasses_full_queue() {
    let rig = sim_rig(Point::new(10.0, 10.0));
    let mut config = PomoConfig::default();
    config.producer.soft_capacity = 1;
    config.producer.move_probability = 0.0;
    config.producer.idle_action_min_secs = 3;
    config.producer.idle_action_max_secs = 3;
    config.scheduler.watchdog_secs = 60;
    config.tasks.dialogue_display_ms = 30_000;
    let actor = PomoActor::new(rig.ctx.clone(), config).with_seed(1).spawn();

    // One long dialogue runs, one waits, and the queue is at capacity.
    run_for(Duration::from_millis(3500)).await;
    let pending = actor.peek_queue();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().any(|t| t.kind == TaskKind::IdleAction));
    assert_eq!(actor.current().map(|t| t.kind), Some(TaskKind::Dialogue));

    actor.shutdown().await;
}
