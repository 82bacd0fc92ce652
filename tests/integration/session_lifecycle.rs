//! Session timer lifecycle: countdown, suspension with drift correction,
//! cycle plans and persistence across restarts.

use crate::helpers::{drain_events, run_for};
use chrono::TimeZone;
use pomo::clock::{Clock, ManualClock};
use pomo::config::SessionConfig;
use pomo::session::notify::{NotifierCall, RecordingNotifier};
use pomo::session::{
    SessionEvent, SessionKind, SessionState, SessionStore, SessionTimer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap(),
    ))
}

fn ticks(events: &[SessionEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Tick { remaining } => Some(*remaining),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn ten_second_focus_with_suspension() {
    let clock = manual_clock();
    let notifier = Arc::new(RecordingNotifier::new());
    let timer = SessionTimer::new(&SessionConfig::default(), SessionStore::in_memory())
        .with_clock(clock.clone())
        .with_notifier(notifier.clone());
    let mut events = timer.subscribe();
    let shutdown = CancellationToken::new();
    let (session, task) = timer.spawn(shutdown.clone());

    session.start_timer(10, SessionKind::Focus).await.unwrap();
    run_for(Duration::from_millis(4500)).await;
    let seen = drain_events(&mut events);
    assert_eq!(ticks(&seen).last(), Some(&6));
    assert_eq!(session.snapshot().await.unwrap().remaining_secs, 6);

    // Host goes to the background for three seconds of wall-clock time.
    session.suspend().await.unwrap();
    clock.advance(chrono::Duration::seconds(3));
    run_for(Duration::from_secs(3)).await;
    assert!(ticks(&drain_events(&mut events)).is_empty());
    session.wake().await.unwrap();
    assert_eq!(session.snapshot().await.unwrap().remaining_secs, 3);

    run_for(Duration::from_secs(10)).await;
    let rest = drain_events(&mut events);
    assert_eq!(ticks(&rest), [3, 2, 1, 0]);
    let completed = rest
        .iter()
        .filter(|e| matches!(e, SessionEvent::Completed { .. }))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(
        rest.last(),
        Some(&SessionEvent::StateChanged {
            state: SessionState::Stopped
        })
    );
    assert_eq!(
        notifier.calls(),
        [
            NotifierCall::Schedule(SessionKind::Focus, Duration::from_secs(6)),
            NotifierCall::CancelAll,
        ]
    );

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn ten_second_focus_with_pause_gap() {
    let clock = manual_clock();
    let timer = SessionTimer::new(&SessionConfig::default(), SessionStore::in_memory())
        .with_clock(clock.clone());
    let mut events = timer.subscribe();
    let shutdown = CancellationToken::new();
    let (session, task) = timer.spawn(shutdown.clone());

    session.start_timer(10, SessionKind::Focus).await.unwrap();
    run_for(Duration::from_millis(4500)).await;
    session.pause().await.unwrap();
    assert_eq!(session.snapshot().await.unwrap().remaining_secs, 6);
    drain_events(&mut events);

    clock.advance(chrono::Duration::seconds(3));
    run_for(Duration::from_secs(3)).await;
    session.resume().await.unwrap();
    assert_eq!(session.snapshot().await.unwrap().remaining_secs, 3);

    run_for(Duration::from_secs(10)).await;
    let rest = drain_events(&mut events);
    assert_eq!(ticks(&rest), [3, 2, 1, 0]);
    assert_eq!(
        rest.last(),
        Some(&SessionEvent::StateChanged {
            state: SessionState::Stopped
        })
    );

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn planned_cycles_alternate_and_stop() {
    let timer = SessionTimer::new(&SessionConfig::default(), SessionStore::in_memory())
        .with_clock(manual_clock());
    let mut events = timer.subscribe();
    let (session, task) = timer.spawn(CancellationToken::new());

    // Two one-minute focus cycles with a one-minute break between them.
    session.plan(2, 1, 1, Some("harvest".to_owned())).await.unwrap();
    session.start().await.unwrap();
    run_for(Duration::from_secs(200)).await;

    let started: Vec<(SessionKind, u32)> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Started {
                kind,
                duration_secs,
            } => Some((kind, duration_secs)),
            _ => None,
        })
        .collect();
    assert_eq!(
        started,
        [
            (SessionKind::Focus, 60),
            (SessionKind::Relax, 60),
            (SessionKind::Focus, 60),
        ]
    );
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Stopped);
    assert_eq!(snapshot.previous_kind, Some(SessionKind::Focus));

    drop(session);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn restart_restores_running_session_with_drift() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let clock = manual_clock();

    let timer = SessionTimer::new(
        &SessionConfig::default(),
        SessionStore::open(&path).unwrap(),
    )
    .with_clock(clock.clone());
    let shutdown = CancellationToken::new();
    let (session, task) = timer.spawn(shutdown.clone());
    session.plan(60, 25, 5, None).await.unwrap();
    session.start().await.unwrap();
    run_for(Duration::from_millis(30_500)).await;
    clock.advance(chrono::Duration::seconds(30));
    shutdown.cancel();
    task.await.unwrap();

    // The process was gone for two minutes.
    clock.advance(chrono::Duration::seconds(120));
    let mut timer = SessionTimer::new(
        &SessionConfig::default(),
        SessionStore::open(&path).unwrap(),
    )
    .with_clock(clock.clone());
    assert!(timer.restore());
    let (session, task) = timer.spawn(CancellationToken::new());

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Running);
    assert_eq!(snapshot.kind, SessionKind::Focus);
    assert_eq!(snapshot.remaining_secs, 1500 - 30 - 120);
    assert_eq!(snapshot.plan.unwrap().last_cycle_secs, 600);
    assert!(snapshot.saved_at <= clock.now());

    drop(session);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn corrupt_state_file_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, r#"{"timestamp": "not a time", "session_state": "running"}"#).unwrap();

    let mut timer = SessionTimer::new(
        &SessionConfig::default(),
        SessionStore::open(&path).unwrap(),
    );
    assert!(!timer.restore());
    let (session, task) = timer.spawn(CancellationToken::new());
    assert_eq!(
        session.snapshot().await.unwrap().state,
        SessionState::Stopped
    );
    drop(session);
    task.await.unwrap();
}
