//! Concrete actor tasks.

pub mod dialogue;
pub mod idle;
pub mod movement;

pub use dialogue::DialogueTask;
pub use idle::IdleActionTask;
pub use movement::MoveTask;

use std::time::Duration;

/// Millisecond setting as a tick period tokio will accept.
pub(crate) fn period(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}
