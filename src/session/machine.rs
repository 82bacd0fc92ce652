//! Focus/relax session state machine.
//!
//! Pure and synchronous: every operation mutates the machine and returns the
//! [`SessionEvent`]s it raised, in order. Wall-clock time only enters through
//! explicit `now` arguments, so pausing, suspension and drift correction are
//! deterministic under test. [`super::timer::SessionTimer`] drives it once per
//! second on tokio.

use crate::error::{PomoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the session timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing planned or running.
    Stopped,
    /// A session is armed and waiting to start.
    Initializing,
    /// Counting down.
    Running,
    /// Countdown suspended by the user.
    Paused,
    /// The last session just ran out.
    Completed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Kind of session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Work period.
    Focus,
    /// Break.
    Relax,
}

impl SessionKind {
    /// The kind that follows this one.
    pub fn other(self) -> Self {
        match self {
            Self::Focus => Self::Relax,
            Self::Relax => Self::Focus,
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Focus => f.write_str("focus"),
            Self::Relax => f.write_str("relax"),
        }
    }
}

/// Notifications raised by the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Remaining seconds changed.
    Tick {
        /// Seconds left in the current session.
        remaining: u32,
    },
    /// The machine entered a new state.
    StateChanged {
        /// The new state.
        state: SessionState,
    },
    /// A session began counting down.
    Started {
        /// Session kind.
        kind: SessionKind,
        /// Full length in seconds.
        duration_secs: u32,
    },
    /// A session reached zero.
    Completed {
        /// Session kind.
        kind: SessionKind,
    },
    /// The next session of the plan is armed.
    NextArmed {
        /// Session kind.
        kind: SessionKind,
        /// Full length in seconds.
        duration_secs: u32,
    },
}

/// Cycle bookkeeping for a planned run of sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePlan {
    /// Length of a full focus session.
    pub focus_secs: u32,
    /// Length of a relax session.
    pub relax_secs: u32,
    /// Full focus sessions not yet started.
    pub remaining_cycles: u32,
    /// Length of the pending short final focus session, `0` if none.
    pub last_cycle_secs: u32,
}

impl CyclePlan {
    /// Divide `target_minutes` into full focus cycles plus a short remainder.
    ///
    /// # Errors
    ///
    /// Returns [`PomoError::Session`] if the focus length or the target is zero.
    pub fn from_target(target_minutes: u32, focus_minutes: u32, relax_minutes: u32) -> Result<Self> {
        if focus_minutes == 0 {
            return Err(PomoError::Session("focus length must be positive".to_owned()));
        }
        if target_minutes == 0 {
            return Err(PomoError::Session("target duration must be positive".to_owned()));
        }
        Ok(Self {
            focus_secs: focus_minutes.saturating_mul(60),
            relax_secs: relax_minutes.saturating_mul(60),
            remaining_cycles: target_minutes / focus_minutes,
            last_cycle_secs: (target_minutes % focus_minutes).saturating_mul(60),
        })
    }

    /// Whether any focus session is still to come.
    pub fn has_pending_focus(&self) -> bool {
        self.remaining_cycles > 0 || self.last_cycle_secs > 0
    }

    /// Consume the next focus session, full cycles first.
    fn take_focus(&mut self) -> Option<u32> {
        if self.remaining_cycles > 0 {
            self.remaining_cycles -= 1;
            Some(self.focus_secs)
        } else if self.last_cycle_secs > 0 {
            Some(std::mem::take(&mut self.last_cycle_secs))
        } else {
            None
        }
    }

    /// Session that follows a completed one, consuming it from the plan.
    fn next_after(&mut self, finished: SessionKind) -> Option<(SessionKind, u32)> {
        match finished {
            SessionKind::Focus if self.has_pending_focus() && self.relax_secs > 0 => {
                Some((SessionKind::Relax, self.relax_secs))
            }
            SessionKind::Focus | SessionKind::Relax => {
                self.take_focus().map(|secs| (SessionKind::Focus, secs))
            }
        }
    }
}

/// Persistable view of the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// State at save time.
    pub state: SessionState,
    /// Kind of the current (or armed) session.
    pub kind: SessionKind,
    /// Kind of the last completed session.
    pub previous_kind: Option<SessionKind>,
    /// Seconds left.
    pub remaining_secs: u32,
    /// Full length of the current session.
    pub duration_secs: u32,
    /// Cycle bookkeeping, if a plan is active.
    pub plan: Option<CyclePlan>,
    /// Associated external work item.
    pub linked_item: Option<String>,
    /// Wall-clock time the snapshot was taken.
    pub saved_at: DateTime<Utc>,
}

/// Focus/relax cycle controller.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    kind: SessionKind,
    previous_kind: Option<SessionKind>,
    remaining: u32,
    duration: u32,
    plan: Option<CyclePlan>,
    linked_item: Option<String>,
    paused_at: Option<DateTime<Utc>>,
    auto_start_next: bool,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SessionMachine {
    /// A stopped machine. With `auto_start_next`, armed follow-up sessions start immediately.
    pub fn new(auto_start_next: bool) -> Self {
        Self {
            state: SessionState::Stopped,
            kind: SessionKind::Focus,
            previous_kind: None,
            remaining: 0,
            duration: 0,
            plan: None,
            linked_item: None,
            paused_at: None,
            auto_start_next,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Kind of the current or armed session.
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Kind of the last completed session.
    pub fn previous_kind(&self) -> Option<SessionKind> {
        self.previous_kind
    }

    /// Seconds left in the current session.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Full length of the current session.
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Active cycle plan.
    pub fn plan(&self) -> Option<&CyclePlan> {
        self.plan.as_ref()
    }

    /// Associated work item.
    pub fn linked_item(&self) -> Option<&str> {
        self.linked_item.as_deref()
    }

    /// When the user paused, if paused.
    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    fn reject(&self, action: &'static str) -> PomoError {
        PomoError::InvalidTransition {
            state: self.state,
            action,
        }
    }

    fn enter(&mut self, state: SessionState, events: &mut Vec<SessionEvent>) {
        self.state = state;
        events.push(SessionEvent::StateChanged { state });
    }

    /// Compute a cycle plan and arm its first focus session.
    ///
    /// # Errors
    ///
    /// Fails while a session is running or paused, or if the plan is empty.
    pub fn plan_cycles(
        &mut self,
        target_minutes: u32,
        focus_minutes: u32,
        relax_minutes: u32,
        linked_item: Option<String>,
    ) -> Result<Vec<SessionEvent>> {
        if matches!(self.state, SessionState::Running | SessionState::Paused) {
            return Err(self.reject("plan"));
        }
        let mut plan = CyclePlan::from_target(target_minutes, focus_minutes, relax_minutes)?;
        let first = plan
            .take_focus()
            .ok_or_else(|| PomoError::Session("plan contains no focus session".to_owned()))?;

        self.plan = Some(plan);
        self.linked_item = linked_item;
        self.previous_kind = None;
        let mut events = Vec::new();
        self.arm(SessionKind::Focus, first, &mut events);
        Ok(events)
    }

    fn arm(&mut self, kind: SessionKind, duration_secs: u32, events: &mut Vec<SessionEvent>) {
        self.kind = kind;
        self.duration = duration_secs;
        self.remaining = duration_secs;
        self.paused_at = None;
        self.enter(SessionState::Initializing, events);
        events.push(SessionEvent::NextArmed {
            kind,
            duration_secs,
        });
    }

    fn begin(&mut self, events: &mut Vec<SessionEvent>) {
        self.paused_at = None;
        self.enter(SessionState::Running, events);
        events.push(SessionEvent::Started {
            kind: self.kind,
            duration_secs: self.duration,
        });
        events.push(SessionEvent::Tick {
            remaining: self.remaining,
        });
    }

    /// Start the armed session.
    ///
    /// # Errors
    ///
    /// Fails unless a session is armed.
    pub fn start(&mut self) -> Result<Vec<SessionEvent>> {
        if self.state != SessionState::Initializing || self.remaining == 0 {
            return Err(self.reject("start"));
        }
        let mut events = Vec::new();
        self.begin(&mut events);
        Ok(events)
    }

    /// Start an ad-hoc session of `duration_secs`.
    ///
    /// Any active plan keeps governing what follows.
    ///
    /// # Errors
    ///
    /// Fails while running or paused, or for a zero duration.
    pub fn start_timer(&mut self, duration_secs: u32, kind: SessionKind) -> Result<Vec<SessionEvent>> {
        if !matches!(
            self.state,
            SessionState::Stopped | SessionState::Initializing | SessionState::Completed
        ) {
            return Err(self.reject("start timer"));
        }
        if duration_secs == 0 {
            return Err(PomoError::Session("session duration must be positive".to_owned()));
        }
        self.kind = kind;
        self.duration = duration_secs;
        self.remaining = duration_secs;
        let mut events = Vec::new();
        self.begin(&mut events);
        Ok(events)
    }

    /// Pause the countdown, remembering when.
    ///
    /// # Errors
    ///
    /// Fails unless running.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<Vec<SessionEvent>> {
        if self.state != SessionState::Running {
            return Err(self.reject("pause"));
        }
        self.paused_at = Some(now);
        let mut events = Vec::new();
        self.enter(SessionState::Paused, &mut events);
        Ok(events)
    }

    /// Continue a paused countdown, charging it the wall-clock time since
    /// [`pause`](Self::pause).
    ///
    /// A gap at least as long as the remaining time completes the session
    /// immediately.
    ///
    /// # Errors
    ///
    /// Fails unless paused with time left.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<Vec<SessionEvent>> {
        if self.state != SessionState::Paused || self.remaining == 0 {
            return Err(self.reject("resume"));
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.remaining = self.remaining.saturating_sub(seconds_between(paused_at, now));
        }
        let mut events = Vec::new();
        self.enter(SessionState::Running, &mut events);
        events.push(SessionEvent::Tick {
            remaining: self.remaining,
        });
        if self.remaining == 0 {
            self.complete(&mut events);
        }
        Ok(events)
    }

    /// Abandon the current session and any remaining plan.
    ///
    /// # Errors
    ///
    /// Fails unless running or paused.
    pub fn cancel(&mut self) -> Result<Vec<SessionEvent>> {
        if !matches!(self.state, SessionState::Running | SessionState::Paused) {
            return Err(self.reject("cancel"));
        }
        self.remaining = 0;
        self.paused_at = None;
        self.plan = None;
        self.linked_item = None;
        let mut events = vec![SessionEvent::Tick { remaining: 0 }];
        self.enter(SessionState::Stopped, &mut events);
        Ok(events)
    }

    /// Advance one second. Does nothing unless running.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.state != SessionState::Running {
            return events;
        }
        self.remaining = self.remaining.saturating_sub(1);
        events.push(SessionEvent::Tick {
            remaining: self.remaining,
        });
        if self.remaining == 0 {
            self.complete(&mut events);
        }
        events
    }

    fn complete(&mut self, events: &mut Vec<SessionEvent>) {
        let finished = self.kind;
        self.previous_kind = Some(finished);
        self.paused_at = None;
        self.enter(SessionState::Completed, events);
        events.push(SessionEvent::Completed { kind: finished });

        let next = self.plan.as_mut().and_then(|plan| plan.next_after(finished));
        match next {
            Some((kind, secs)) => {
                self.arm(kind, secs, events);
                if self.auto_start_next {
                    self.begin(events);
                }
            }
            None => {
                self.plan = None;
                self.enter(SessionState::Stopped, events);
            }
        }
    }

    /// Capture the machine for persistence at `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            kind: self.kind,
            previous_kind: self.previous_kind,
            remaining_secs: self.remaining,
            duration_secs: self.duration,
            plan: self.plan,
            linked_item: self.linked_item.clone(),
            saved_at: self.paused_at.unwrap_or(now),
        }
    }

    /// Snapshot for a host that is about to be suspended.
    ///
    /// A running countdown keeps its state in the snapshot so that
    /// [`restore`](Self::restore) can subtract the time spent away.
    pub fn suspend(&self, now: DateTime<Utc>) -> SessionSnapshot {
        self.snapshot(now)
    }

    /// Rebuild from a snapshot taken before suspension.
    ///
    /// A snapshot saved while running loses `now - saved_at` seconds,
    /// never dropping below zero; reaching zero fires completion right away.
    /// A paused session stays paused with its original pause instant, so the
    /// next [`resume`](Self::resume) charges the whole gap including downtime.
    /// Armed sessions come back exactly as saved.
    pub fn restore(&mut self, snapshot: SessionSnapshot, now: DateTime<Utc>) -> Vec<SessionEvent> {
        self.kind = snapshot.kind;
        self.previous_kind = snapshot.previous_kind;
        self.duration = snapshot.duration_secs;
        self.remaining = snapshot.remaining_secs;
        self.plan = snapshot.plan;
        self.linked_item = snapshot.linked_item;
        self.paused_at = None;

        let mut events = Vec::new();
        match snapshot.state {
            SessionState::Running => {
                self.remaining = self
                    .remaining
                    .saturating_sub(seconds_between(snapshot.saved_at, now));
                self.enter(SessionState::Running, &mut events);
                events.push(SessionEvent::Tick {
                    remaining: self.remaining,
                });
                if self.remaining == 0 {
                    self.complete(&mut events);
                }
            }
            SessionState::Paused if self.remaining > 0 => {
                self.paused_at = Some(snapshot.saved_at);
                self.enter(SessionState::Paused, &mut events);
                events.push(SessionEvent::Tick {
                    remaining: self.remaining,
                });
            }
            SessionState::Initializing if self.remaining > 0 => {
                self.enter(SessionState::Initializing, &mut events);
                events.push(SessionEvent::NextArmed {
                    kind: self.kind,
                    duration_secs: self.duration,
                });
            }
            _ => {
                self.remaining = 0;
                self.plan = None;
                self.enter(SessionState::Stopped, &mut events);
            }
        }
        events
    }
}

/// Whole seconds from `since` to `now`, zero if the clock went backwards.
fn seconds_between(since: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    u32::try_from((now - since).num_seconds().max(0)).unwrap_or(u32::MAX)
}
