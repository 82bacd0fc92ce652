//! Focus/relax session timer.
//!
//! [`SessionMachine`] holds the cycle logic, [`SessionTimer`] drives it once
//! per second and persists it through a [`SessionStore`], and a
//! [`SessionNotifier`] is told when a reminder should fire while the host is
//! away.

pub mod machine;
pub mod notify;
pub mod store;
pub mod timer;

pub use machine::{
    CyclePlan, SessionEvent, SessionKind, SessionMachine, SessionSnapshot, SessionState,
};
pub use notify::{LogNotifier, SessionNotifier};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, SessionStore};
pub use timer::{SessionHandle, SessionTimer};
