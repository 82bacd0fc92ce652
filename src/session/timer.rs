//! Async one-tick-per-second driver for [`SessionMachine`].
//!
//! The machine is owned by a single tokio task. Callers talk to it through a
//! cloneable [`SessionHandle`] (mpsc commands with oneshot replies) and
//! observe it through a broadcast channel of [`SessionEvent`]s. State is
//! written to the [`SessionStore`] on every state change and when the driver
//! exits, so a crash or a suspended host can be restored with drift
//! correction.

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{PomoError, Result};
use crate::session::machine::{
    SessionEvent, SessionKind, SessionMachine, SessionSnapshot, SessionState,
};
use crate::session::notify::{LogNotifier, SessionNotifier};
use crate::session::store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const COMMAND_CHANNEL_CAPACITY: usize = 16;
const TICK: Duration = Duration::from_secs(1);

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Plan {
        target_minutes: u32,
        focus_minutes: u32,
        relax_minutes: u32,
        linked_item: Option<String>,
        reply: Reply<()>,
    },
    Start(Reply<()>),
    StartTimer {
        duration_secs: u32,
        kind: SessionKind,
        reply: Reply<()>,
    },
    Pause(Reply<()>),
    Resume(Reply<()>),
    Cancel(Reply<()>),
    Suspend(Reply<SessionSnapshot>),
    Wake(Reply<()>),
    Snapshot(Reply<SessionSnapshot>),
}

/// Owns a [`SessionMachine`] and drives it on tokio time.
pub struct SessionTimer {
    machine: SessionMachine,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn SessionNotifier>,
    events: broadcast::Sender<SessionEvent>,
    suspended: Option<SessionSnapshot>,
}

impl SessionTimer {
    /// Create a stopped timer persisting to `store`.
    pub fn new(config: &SessionConfig, store: SessionStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            machine: SessionMachine::new(config.auto_start_next),
            store,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            events,
            suspended: None,
        }
    }

    /// Use a different wall clock for pause timestamps and drift correction.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different notification collaborator.
    pub fn with_notifier(mut self, notifier: Arc<dyn SessionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Receive session events, including those raised by [`restore`](Self::restore).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Load persisted state, applying drift correction to a running session.
    ///
    /// Returns `false` when there was nothing usable to restore.
    pub fn restore(&mut self) -> bool {
        let Some(snapshot) = self.store.load() else {
            return false;
        };
        let saved_state = snapshot.state;
        let events = self.machine.restore(snapshot, self.clock.now());
        self.notifier.cancel_all();
        info!(
            %saved_state,
            state = %self.machine.state(),
            remaining = self.machine.remaining(),
            "session state restored"
        );
        self.publish(events);
        true
    }

    /// Start the driver task. It stops when `shutdown` fires or every handle is dropped.
    pub fn spawn(self, shutdown: CancellationToken) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = SessionHandle {
            tx,
            events: self.events.clone(),
        };
        let task = tokio::spawn(self.run(rx, shutdown));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        debug!(state = %self.machine.state(), "session timer started");
        let mut ticker: Option<Interval> = None;

        loop {
            self.sync_ticker(&mut ticker);
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = next_tick(&mut ticker) => {
                    let events = self.machine.tick();
                    self.publish(events);
                }
            }
        }

        self.on_exit();
        debug!("session timer stopped");
    }

    fn sync_ticker(&self, ticker: &mut Option<Interval>) {
        let should_tick =
            self.suspended.is_none() && self.machine.state() == SessionState::Running;
        match (should_tick, ticker.is_some()) {
            (true, false) => {
                *ticker = Some(tokio::time::interval_at(Instant::now() + TICK, TICK));
            }
            (false, true) => *ticker = None,
            _ => {}
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Plan {
                target_minutes,
                focus_minutes,
                relax_minutes,
                linked_item,
                reply,
            } => {
                let result = self.awake().and_then(|()| {
                    self.machine
                        .plan_cycles(target_minutes, focus_minutes, relax_minutes, linked_item)
                });
                let _ = reply.send(self.apply(result));
            }
            Command::Start(reply) => {
                let result = self.awake().and_then(|()| self.machine.start());
                let _ = reply.send(self.apply(result));
            }
            Command::StartTimer {
                duration_secs,
                kind,
                reply,
            } => {
                let result = self
                    .awake()
                    .and_then(|()| self.machine.start_timer(duration_secs, kind));
                let _ = reply.send(self.apply(result));
            }
            Command::Pause(reply) => {
                let now = self.clock.now();
                let result = self.awake().and_then(|()| self.machine.pause(now));
                if result.is_ok() {
                    self.notifier.cancel_all();
                }
                let _ = reply.send(self.apply(result));
            }
            Command::Resume(reply) => {
                let now = self.clock.now();
                let result = self.awake().and_then(|()| self.machine.resume(now));
                if result.is_ok() {
                    self.notifier.cancel_all();
                }
                let _ = reply.send(self.apply(result));
            }
            Command::Cancel(reply) => {
                let result = self.awake().and_then(|()| self.machine.cancel());
                if result.is_ok() {
                    self.notifier.cancel_all();
                }
                let _ = reply.send(self.apply(result));
            }
            Command::Suspend(reply) => {
                let _ = reply.send(Ok(self.suspend()));
            }
            Command::Wake(reply) => {
                let result = match self.suspended.take() {
                    Some(snapshot) => {
                        let events = self.machine.restore(snapshot, self.clock.now());
                        self.notifier.cancel_all();
                        self.publish(events);
                        self.persist();
                        Ok(())
                    }
                    None => Err(PomoError::Session("session timer is not suspended".to_owned())),
                };
                let _ = reply.send(result);
            }
            Command::Snapshot(reply) => {
                let snapshot = match &self.suspended {
                    Some(snapshot) => snapshot.clone(),
                    None => self.machine.snapshot(self.clock.now()),
                };
                let _ = reply.send(Ok(snapshot));
            }
        }
    }

    fn awake(&self) -> Result<()> {
        if self.suspended.is_some() {
            return Err(PomoError::Session("session timer is suspended".to_owned()));
        }
        Ok(())
    }

    /// Publish and persist the outcome of a machine operation.
    fn apply(&mut self, result: Result<Vec<SessionEvent>>) -> Result<()> {
        let events = result?;
        self.publish(events);
        Ok(())
    }

    /// Freeze the countdown as if the host went to sleep.
    fn suspend(&mut self) -> SessionSnapshot {
        if let Some(snapshot) = &self.suspended {
            return snapshot.clone();
        }
        let snapshot = self.machine.suspend(self.clock.now());
        if let Err(e) = self.write(&snapshot) {
            warn!("cannot persist session state on suspend: {e}");
        }
        if snapshot.state == SessionState::Running {
            self.notifier.schedule(
                snapshot.kind,
                Duration::from_secs(u64::from(snapshot.remaining_secs)),
            );
        }
        info!(
            state = %snapshot.state,
            remaining = snapshot.remaining_secs,
            "session suspended"
        );
        self.suspended = Some(snapshot.clone());
        snapshot
    }

    fn on_exit(&mut self) {
        if self.suspended.is_none() {
            self.suspend();
        }
    }

    fn publish(&mut self, events: Vec<SessionEvent>) {
        let mut state_changed = false;
        for event in events {
            match &event {
                SessionEvent::Started {
                    kind,
                    duration_secs,
                } => info!(%kind, duration_secs, "session started"),
                SessionEvent::Completed { kind } => info!(%kind, "session completed"),
                SessionEvent::StateChanged { state } => {
                    debug!(%state, "session state changed");
                    state_changed = true;
                }
                SessionEvent::Tick { .. } | SessionEvent::NextArmed { .. } => {}
            }
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        if state_changed {
            self.persist();
        }
    }

    fn persist(&mut self) {
        let snapshot = self.machine.snapshot(self.clock.now());
        if let Err(e) = self.write(&snapshot) {
            warn!("cannot persist session state: {e}");
        }
    }

    /// A stopped session leaves nothing behind to restore.
    fn write(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        if snapshot.state == SessionState::Stopped {
            self.store.clear()
        } else {
            self.store.save(snapshot)
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Cloneable control surface for a running [`SessionTimer`].
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| PomoError::Channel("session timer has stopped".to_owned()))?;
        rx.await
            .map_err(|_| PomoError::Channel("session timer dropped the request".to_owned()))?
    }

    /// Plan `target_minutes` of focus in cycles and arm the first session.
    ///
    /// # Errors
    ///
    /// Fails while a session is running or paused, or for an empty plan.
    pub async fn plan(
        &self,
        target_minutes: u32,
        focus_minutes: u32,
        relax_minutes: u32,
        linked_item: Option<String>,
    ) -> Result<()> {
        self.request(|reply| Command::Plan {
            target_minutes,
            focus_minutes,
            relax_minutes,
            linked_item,
            reply,
        })
        .await
    }

    /// Plan using the configured lengths.
    ///
    /// # Errors
    ///
    /// See [`plan`](Self::plan).
    pub async fn plan_from_config(
        &self,
        config: &SessionConfig,
        linked_item: Option<String>,
    ) -> Result<()> {
        self.plan(
            config.target_minutes,
            config.focus_minutes,
            config.relax_minutes,
            linked_item,
        )
        .await
    }

    /// Start the armed session.
    ///
    /// # Errors
    ///
    /// Fails unless a session is armed.
    pub async fn start(&self) -> Result<()> {
        self.request(Command::Start).await
    }

    /// Start an ad-hoc countdown.
    ///
    /// # Errors
    ///
    /// Fails while running or paused, or for a zero duration.
    pub async fn start_timer(&self, duration_secs: u32, kind: SessionKind) -> Result<()> {
        self.request(|reply| Command::StartTimer {
            duration_secs,
            kind,
            reply,
        })
        .await
    }

    /// Pause the countdown.
    ///
    /// # Errors
    ///
    /// Fails unless running.
    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    /// Resume a paused countdown, less the wall-clock time spent paused.
    ///
    /// # Errors
    ///
    /// Fails unless paused with time left.
    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await
    }

    /// Abandon the session and its plan.
    ///
    /// # Errors
    ///
    /// Fails unless running or paused.
    pub async fn cancel(&self) -> Result<()> {
        self.request(Command::Cancel).await
    }

    /// Persist state and stop ticking, as when the host is backgrounded.
    ///
    /// # Errors
    ///
    /// Fails only if the driver has stopped.
    pub async fn suspend(&self) -> Result<SessionSnapshot> {
        self.request(Command::Suspend).await
    }

    /// Come back from [`suspend`](Self::suspend), subtracting the time spent away.
    ///
    /// # Errors
    ///
    /// Fails if the timer is not suspended.
    pub async fn wake(&self) -> Result<()> {
        self.request(Command::Wake).await
    }

    /// Current state of the machine.
    ///
    /// # Errors
    ///
    /// Fails only if the driver has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Receive session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::session::notify::{NotifierCall, RecordingNotifier};
    use chrono::TimeZone;

    struct Rig {
        handle: SessionHandle,
        task: JoinHandle<()>,
        shutdown: CancellationToken,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        events: broadcast::Receiver<SessionEvent>,
    }

    fn rig(store: SessionStore) -> Rig {
        let clock = Arc::new(ManualClock::new(
            chrono::Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
        ));
        let notifier = Arc::new(RecordingNotifier::new());
        let timer = SessionTimer::new(&SessionConfig::default(), store)
            .with_clock(clock.clone())
            .with_notifier(notifier.clone());
        let events = timer.subscribe();
        let shutdown = CancellationToken::new();
        let (handle, task) = timer.spawn(shutdown.clone());
        Rig {
            handle,
            task,
            shutdown,
            clock,
            notifier,
            events,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    async fn sleep_secs(secs: f64) {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second() {
        let mut rig = rig(SessionStore::in_memory());
        rig.handle.start_timer(10, SessionKind::Focus).await.unwrap();

        sleep_secs(4.5).await;
        let ticks: Vec<u32> = drain(&mut rig.events)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Tick { remaining } => Some(remaining),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, [10, 9, 8, 7, 6]);
        assert_eq!(rig.handle.snapshot().await.unwrap().remaining_secs, 6);

        rig.shutdown.cancel();
        rig.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn paused_timer_does_not_tick() {
        let mut rig = rig(SessionStore::in_memory());
        rig.handle.start_timer(10, SessionKind::Focus).await.unwrap();
        sleep_secs(2.5).await;
        rig.handle.pause().await.unwrap();
        drain(&mut rig.events);

        rig.clock.advance(chrono::Duration::seconds(3));
        sleep_secs(3.0).await;
        assert!(drain(&mut rig.events).is_empty());
        assert_eq!(rig.handle.snapshot().await.unwrap().remaining_secs, 8);

        rig.handle.resume().await.unwrap();
        assert_eq!(rig.handle.snapshot().await.unwrap().remaining_secs, 5);
        sleep_secs(1.5).await;
        assert_eq!(rig.handle.snapshot().await.unwrap().remaining_secs, 4);
        assert_eq!(
            rig.notifier.calls(),
            [NotifierCall::CancelAll, NotifierCall::CancelAll]
        );

        rig.shutdown.cancel();
        rig.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn resume_after_long_pause_completes_at_once() {
        let mut rig = rig(SessionStore::in_memory());
        rig.handle.start_timer(10, SessionKind::Relax).await.unwrap();
        sleep_secs(2.5).await;
        rig.handle.pause().await.unwrap();
        drain(&mut rig.events);

        rig.clock.advance(chrono::Duration::minutes(5));
        rig.handle.resume().await.unwrap();
        let events = drain(&mut rig.events);
        assert!(events.contains(&SessionEvent::Completed {
            kind: SessionKind::Relax
        }));
        assert_eq!(
            events.last(),
            Some(&SessionEvent::StateChanged {
                state: SessionState::Stopped
            })
        );

        sleep_secs(3.0).await;
        assert!(drain(&mut rig.events).is_empty());
        assert_eq!(rig.handle.snapshot().await.unwrap().state, SessionState::Stopped);

        rig.shutdown.cancel();
        rig.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn suspend_and_wake_apply_drift() {
        let rig = rig(SessionStore::in_memory());
        rig.handle.start_timer(10, SessionKind::Focus).await.unwrap();
        sleep_secs(4.5).await;

        let saved = rig.handle.suspend().await.unwrap();
        assert_eq!(saved.remaining_secs, 6);
        assert_eq!(
            rig.notifier.calls(),
            [NotifierCall::Schedule(SessionKind::Focus, Duration::from_secs(6))]
        );
        assert!(rig.handle.pause().await.is_err());

        rig.clock.advance(chrono::Duration::seconds(3));
        sleep_secs(3.0).await;
        assert_eq!(rig.handle.snapshot().await.unwrap().remaining_secs, 6);

        rig.handle.wake().await.unwrap();
        let now = rig.handle.snapshot().await.unwrap();
        assert_eq!(now.state, SessionState::Running);
        assert_eq!(now.remaining_secs, 3);
        assert_eq!(rig.notifier.calls().last(), Some(&NotifierCall::CancelAll));

        rig.shutdown.cancel();
        rig.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_commands_report_errors() {
        let rig = rig(SessionStore::in_memory());
        let err = rig.handle.pause().await.unwrap_err();
        assert!(matches!(
            err,
            PomoError::InvalidTransition {
                state: SessionState::Stopped,
                ..
            }
        ));
        assert!(rig.handle.wake().await.is_err());
        rig.shutdown.cancel();
        rig.task.await.unwrap();
        assert!(matches!(
            rig.handle.start().await.unwrap_err(),
            PomoError::Channel(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exit_persists_for_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let rig = rig(SessionStore::open(&path).unwrap());
        rig.handle.plan(50, 25, 5, Some("weeding".to_owned())).await.unwrap();
        rig.handle.start().await.unwrap();
        sleep_secs(10.5).await;
        rig.shutdown.cancel();
        rig.task.await.unwrap();
        assert!(matches!(
            rig.notifier.calls().last(),
            Some(NotifierCall::Schedule(SessionKind::Focus, _))
        ));

        let clock = Arc::new(ManualClock::new(rig.clock.now() + chrono::Duration::seconds(90)));
        let mut timer = SessionTimer::new(&SessionConfig::default(), SessionStore::open(&path).unwrap())
            .with_clock(clock);
        assert!(timer.restore());
        let (handle, task) = timer.spawn(CancellationToken::new());

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.remaining_secs, 1500 - 10 - 90);
        assert_eq!(snapshot.linked_item.as_deref(), Some("weeding"));
        assert_eq!(snapshot.plan.unwrap().remaining_cycles, 1);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_session_clears_stored_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let rig = rig(SessionStore::open(&path).unwrap());
        rig.handle.start_timer(60, SessionKind::Focus).await.unwrap();
        sleep_secs(2.5).await;
        assert!(SessionStore::open(&path).unwrap().load().is_some());

        rig.handle.cancel().await.unwrap();
        assert!(SessionStore::open(&path).unwrap().load().is_none());

        rig.shutdown.cancel();
        rig.task.await.unwrap();
        let mut timer = SessionTimer::new(&SessionConfig::default(), SessionStore::open(&path).unwrap());
        assert!(!timer.restore());
    }

    #[tokio::test]
    async fn restore_without_state_is_a_no_op() {
        let mut timer = SessionTimer::new(&SessionConfig::default(), SessionStore::in_memory());
        assert!(!timer.restore());
    }
}
