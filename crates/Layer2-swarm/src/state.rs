//! Swarm and task state machines

use serde::{Deserialize, Serialize};

/// Lifecycle state of a swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmState {
    /// Registered, not yet dispatching work
    Created,

    /// Workers are being assigned tasks
    Active,

    /// All work is in, branches are being merged
    Merging,

    /// Merged onto the base branch
    Landed,

    /// Stopped before landing
    Cancelled,
}

impl SwarmState {
    /// Every state, in lifecycle order
    pub const ALL: [SwarmState; 5] = [
        SwarmState::Created,
        SwarmState::Active,
        SwarmState::Merging,
        SwarmState::Landed,
        SwarmState::Cancelled,
    ];

    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwarmState::Landed | SwarmState::Cancelled)
    }

    /// The single transition table for swarms.
    ///
    /// Happy path is linear; any non-terminal state may be cancelled.
    pub fn can_transition_to(&self, next: SwarmState) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (SwarmState::Created, SwarmState::Active)
                | (SwarmState::Active, SwarmState::Merging)
                | (SwarmState::Merging, SwarmState::Landed)
                | (_, SwarmState::Cancelled)
        )
    }

    /// Get display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            SwarmState::Created => "created",
            SwarmState::Active => "active",
            SwarmState::Merging => "merging",
            SwarmState::Landed => "landed",
            SwarmState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SwarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// State of a single task inside a swarm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Waiting for a worker
    #[default]
    Pending,

    /// Bound to a worker
    Assigned,

    /// The worker's branch is merged
    Merged,
}

impl TaskState {
    pub fn is_merged(&self) -> bool {
        matches!(self, TaskState::Merged)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Assigned => "assigned",
            TaskState::Merged => "merged",
        }
    }

    /// Symbol for compact listings
    pub fn symbol(&self) -> &'static str {
        match self {
            TaskState::Pending => "◯",
            TaskState::Assigned => "⟳",
            TaskState::Merged => "✓",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
