//! Swarm Manager errors

use crate::state::{SwarmState, TaskState};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SwarmError>;

/// Typed failures of the Swarm Manager.
///
/// Every failure is raised before any field is written, so a caller can
/// correct the precondition and retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwarmError {
    #[error("Swarm not found: {0}")]
    NotFound(String),

    #[error("Swarm already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid transition for swarm {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: SwarmState,
        to: SwarmState,
    },

    #[error("Task {issue_id} not found in swarm {swarm_id}")]
    TaskNotFound { swarm_id: String, issue_id: String },

    #[error("Task {issue_id} is {actual}, expected {expected}")]
    InvalidTaskState {
        issue_id: String,
        actual: TaskState,
        expected: TaskState,
    },

    #[error("Duplicate task {issue_id} in swarm {swarm_id}")]
    DuplicateTask { swarm_id: String, issue_id: String },

    #[error("Swarm {id} is still {state}")]
    NotTerminal { id: String, state: SwarmState },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SwarmError {
    /// Absent swarm or task
    pub fn is_not_found(&self) -> bool {
        matches!(self, SwarmError::NotFound(_) | SwarmError::TaskNotFound { .. })
    }
}
