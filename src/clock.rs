//! Wall-clock source.
//!
//! The session timer measures suspension gaps against real wall-clock time,
//! which tokio's monotonic clock cannot see across process suspension. The
//! [`Clock`] trait lets tests substitute a [`ManualClock`].

use chrono::{DateTime, Local, Timelike, Utc};
use std::sync::{Arc, Mutex};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Current hour of day (0-23) in the local time zone.
    fn local_hour(&self) -> u32 {
        self.now().with_timezone(&Local).hour()
    }
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    hour: Arc<Mutex<Option<u32>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
            hour: Arc::new(Mutex::new(None)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }

    /// Pin the reported local hour regardless of the current instant.
    pub fn set_local_hour(&self, hour: u32) {
        *self.hour.lock().unwrap_or_else(|e| e.into_inner()) = Some(hour % 24);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn local_hour(&self) -> u32 {
        match *self.hour.lock().unwrap_or_else(|e| e.into_inner()) {
            Some(hour) => hour,
            None => self.now().with_timezone(&Local).hour(),
        }
    }
}
