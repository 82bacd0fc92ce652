//! Local notification collaborator.
//!
//! The timer schedules a reminder for the moment a running session would end
//! when the host is suspended, and withdraws pending reminders whenever the
//! user pauses, cancels or comes back.

use crate::session::machine::SessionKind;
use std::time::Duration;
use tracing::info;

/// Schedules and withdraws "session finished" reminders.
pub trait SessionNotifier: Send + Sync {
    /// Remind the user that a `kind` session ends after `lead`.
    fn schedule(&self, kind: SessionKind, lead: Duration);
    /// Withdraw every pending reminder.
    fn cancel_all(&self);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl SessionNotifier for LogNotifier {
    fn schedule(&self, kind: SessionKind, lead: Duration) {
        info!(%kind, lead_secs = lead.as_secs(), "session reminder scheduled");
    }

    fn cancel_all(&self) {
        info!("session reminders cancelled");
    }
}

/// Notifier that remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: std::sync::Mutex<Vec<NotifierCall>>,
}

/// One call made to a [`RecordingNotifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierCall {
    /// `schedule(kind, lead)`.
    Schedule(SessionKind, Duration),
    /// `cancel_all()`.
    CancelAll,
}

impl RecordingNotifier {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls so far, oldest first.
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl SessionNotifier for RecordingNotifier {
    fn schedule(&self, kind: SessionKind, lead: Duration) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(NotifierCall::Schedule(kind, lead));
    }

    fn cancel_all(&self) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(NotifierCall::CancelAll);
    }
}
