//! Queue ordering, priority preemption and watchdog behaviour through the
//! public actor handle.

use crate::helpers::{drain_events, run_for, sim_rig};
use pomo::actor::{Navigator, Point};
use pomo::config::{PomoConfig, TaskConfig};
use pomo::scheduler::{CancelReason, LoopState};
use pomo::tasks::{DialogueTask, MoveTask};
use pomo::{PomoActor, SchedulerEvent, TaskKind};
use std::time::Duration;

fn order(events: &[SchedulerEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| match e {
            SchedulerEvent::Started { task } => format!("start {}", task.summary),
            SchedulerEvent::Finished { task, .. } => format!("finish {}", task.summary),
            SchedulerEvent::Cancelled { task, reason } => {
                format!("cancel {} ({reason})", task.summary)
            }
            SchedulerEvent::Failed { task, .. } => format!("fail {}", task.summary),
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn enqueued_moves_run_in_order() {
    let rig = sim_rig(Point::new(2.0, 2.0));
    let actor = PomoActor::new(rig.ctx.clone(), PomoConfig::default())
        .without_producer()
        .spawn();
    let mut events = actor.subscribe();
    let tasks = TaskConfig::default();

    for dest in [Point::new(4.0, 2.0), Point::new(4.0, 4.0), Point::new(2.0, 4.0)] {
        actor.enqueue(Box::new(MoveTask::plan(rig.navigator.as_ref(), dest, &tasks).unwrap()));
    }
    run_for(Duration::from_secs(5)).await;

    assert_eq!(
        order(&drain_events(&mut events)),
        [
            "start to (4.0, 2.0)",
            "finish to (4.0, 2.0)",
            "start to (4.0, 4.0)",
            "finish to (4.0, 4.0)",
            "start to (2.0, 4.0)",
            "finish to (2.0, 4.0)",
        ]
    );
    assert_eq!(actor.state(), LoopState::Idle);
    actor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn interaction_preempts_then_interrupted_move_resumes() {
    let rig = sim_rig(Point::new(2.0, 2.0));
    let actor = PomoActor::new(rig.ctx.clone(), PomoConfig::default())
        .without_producer()
        .spawn();
    let mut events = actor.subscribe();
    let tasks = TaskConfig::default();

    let a = MoveTask::plan(rig.navigator.as_ref(), Point::new(8.0, 2.0), &tasks).unwrap();
    let b = MoveTask::plan(rig.navigator.as_ref(), Point::new(8.0, 6.0), &tasks).unwrap();
    actor.enqueue(Box::new(a));
    actor.enqueue(Box::new(b));

    run_for(Duration::from_millis(500)).await;
    assert_eq!(actor.current().unwrap().summary, "to (8.0, 2.0)");
    assert_eq!(actor.peek_queue().len(), 1);

    actor.interact("Hello");
    run_for(Duration::from_millis(100)).await;
    // The interrupted move stops where it was and waits behind the greeting.
    assert!(!rig.animator.is_moving());
    assert_eq!(actor.current().unwrap().kind, TaskKind::Dialogue);
    let pending: Vec<String> = actor.peek_queue().into_iter().map(|d| d.summary).collect();
    assert_eq!(pending, ["to (8.0, 2.0)", "to (8.0, 6.0)"]);

    run_for(Duration::from_secs(15)).await;
    assert_eq!(
        order(&drain_events(&mut events)),
        [
            "start to (8.0, 2.0)",
            "cancel to (8.0, 2.0) (preempted)",
            "start \"Hello\"",
            "finish \"Hello\"",
            "start to (8.0, 2.0)",
            "finish to (8.0, 2.0)",
            "start to (8.0, 6.0)",
            "finish to (8.0, 6.0)",
        ]
    );
    assert_eq!(rig.navigator.position(), Point::new(8.0, 6.0));
    assert!(!rig.dialogue.is_visible());
    assert_eq!(
        rig.animator.triggers(),
        [pomo::actor::AnimationTrigger::Greet]
    );
    actor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn double_preemption_cancels_first_urgent_task() {
    let rig = sim_rig(Point::new(2.0, 2.0));
    let actor = PomoActor::new(rig.ctx.clone(), PomoConfig::default())
        .without_producer()
        .spawn();
    let mut events = actor.subscribe();
    let tasks = TaskConfig::default();

    actor.interrupt(Box::new(DialogueTask::new("first", &tasks)));
    run_for(Duration::from_millis(200)).await;
    actor.interrupt(Box::new(DialogueTask::new("second", &tasks)));
    run_for(Duration::from_millis(120)).await;

    assert_eq!(actor.current().unwrap().summary, "\"second\"");
    let seen = order(&drain_events(&mut events));
    assert_eq!(
        seen,
        [
            "start \"first\"",
            "cancel \"first\" (preempted)",
            "start \"second\"",
        ]
    );
    // Only "second" has text on screen.
    assert_eq!(rig.dialogue.text(), "se");
    actor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn per_kind_watchdog_cuts_long_dialogue() {
    let rig = sim_rig(Point::new(2.0, 2.0));
    let mut config = PomoConfig::default();
    config.tasks.dialogue_display_ms = 60_000;
    config.scheduler.watchdog_overrides.dialogue = Some(2);
    let tasks = config.tasks.clone();
    let actor = PomoActor::new(rig.ctx.clone(), config)
        .without_producer()
        .spawn();
    let mut events = actor.subscribe();

    actor.enqueue(Box::new(DialogueTask::new("A very long goodbye", &tasks)));
    run_for(Duration::from_millis(1900)).await;
    assert!(rig.dialogue.is_visible());

    run_for(Duration::from_millis(200)).await;
    assert!(!rig.dialogue.is_visible());
    assert!(rig.dialogue.text().is_empty());
    let cancelled = drain_events(&mut events)
        .into_iter()
        .find_map(|e| match e {
            SchedulerEvent::Cancelled { reason, .. } => Some(reason),
            _ => None,
        });
    assert_eq!(cancelled, Some(CancelReason::Watchdog));
    actor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_reverts_running_task() {
    let rig = sim_rig(Point::new(2.0, 2.0));
    let actor = PomoActor::new(rig.ctx.clone(), PomoConfig::default())
        .without_producer()
        .spawn();
    let task = MoveTask::plan(
        rig.navigator.as_ref(),
        Point::new(2.0, 12.0),
        &TaskConfig::default(),
    )
    .unwrap();
    actor.enqueue(Box::new(task));
    run_for(Duration::from_secs(1)).await;
    assert!(rig.animator.is_moving());

    actor.shutdown().await;
    assert!(!rig.animator.is_moving());
    assert!(!rig.navigator.has_path());
}
