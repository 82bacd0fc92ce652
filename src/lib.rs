//! Pomo: the headless core of a farming Pomodoro companion.
//!
//! Two independent engines:
//!
//! - **Actor scheduler**: a single-consumer loop executing one actor task at
//!   a time (walk, talk, water the crops) from a queue fed by a self-driving
//!   producer. User interaction jumps the queue and preempts the running task.
//!   Every task runs under a watchdog and a cooperative cancellation token.
//! - **Session timer**: a focus/relax cycle controller ticking once per
//!   second, persisting its state so that time spent suspended is subtracted
//!   on restore.
//!
//! Navigation, animation, the dialogue bubble, durable storage and
//! notifications are collaborators behind traits; [`actor::sim`] provides
//! headless implementations.

pub mod actor;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod tasks;

pub use actor::{ActorContext, ActorHandle, PomoActor};
pub use config::PomoConfig;
pub use error::{PomoError, Result};
pub use scheduler::{ActorTask, SchedulerEvent, TaskDescriptor, TaskKind};
pub use session::{SessionEvent, SessionHandle, SessionKind, SessionState, SessionTimer};
