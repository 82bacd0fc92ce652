//! Error types for the pomo core.

/// Top-level error type for the actor scheduler and session timer.
#[derive(Debug, thiserror::Error)]
pub enum PomoError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable key-value storage error.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A task observed its cancellation signal.
    ///
    /// This is a cooperative signal, not a failure.
    #[error("task cancelled")]
    Cancelled,

    /// A task failed while executing.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// The navigation collaborator cannot build a complete path to a point.
    #[error("destination ({x:.2}, {y:.2}) is unreachable")]
    Unreachable {
        /// Destination x coordinate.
        x: f32,
        /// Destination y coordinate.
        y: f32,
    },

    /// A session operation was requested from a state that does not allow it.
    #[error("cannot {action} while session is {state}")]
    InvalidTransition {
        /// State the session was in.
        state: crate::session::SessionState,
        /// Operation that was rejected.
        action: &'static str,
    },

    /// Session planning or driver error.
    #[error("session error: {0}")]
    Session(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

impl PomoError {
    /// Returns `true` for the cooperative cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PomoError>;
