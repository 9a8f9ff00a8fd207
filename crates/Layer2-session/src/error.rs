//! Session Controller errors

use crate::session::SessionStatus;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures of the Session Controller.
///
/// Readiness and teardown results are outcomes, not errors; see
/// `ReadyOutcome` and `TerminateOutcome`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid status change for session {session}: {from} -> {to}")]
    InvalidTransition {
        session: String,
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Session {0} has been terminated")]
    NotRunning(String),

    #[error("Failed to spawn session: {0}")]
    Spawn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound(_))
    }
}
