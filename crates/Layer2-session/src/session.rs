//! Session identity and status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one worker session: a worker inside a rig
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub rig: String,
    pub worker: String,
}

impl SessionKey {
    pub fn new(rig: impl Into<String>, worker: impl Into<String>) -> Self {
        Self {
            rig: rig.into(),
            worker: worker.into(),
        }
    }

    /// Session name, `gt-<rig>-<worker>`
    pub fn session_name(&self) -> String {
        format!("gt-{}-{}", self.rig, self.worker)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.session_name())
    }
}

/// Lifecycle status of a worker session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Process started, prompt not seen yet
    Spawning,

    /// Prompt seen, waiting for instructions
    Ready,

    /// Busy on a task
    Working,

    /// Between tasks
    Idle,

    /// Worker reported a failure
    Error,

    /// Asked to wind down
    PendingShutdown,

    /// Process group is gone
    Terminated,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 7] = [
        SessionStatus::Spawning,
        SessionStatus::Ready,
        SessionStatus::Working,
        SessionStatus::Idle,
        SessionStatus::Error,
        SessionStatus::PendingShutdown,
        SessionStatus::Terminated,
    ];

    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionStatus::Terminated)
    }

    /// Status table.
    ///
    /// Every live status may end in `Terminated`; nothing leaves it.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Spawning, Ready) | (Spawning, Error) => true,
            (Ready, Working) | (Ready, Idle) => true,
            (Working, Idle) | (Idle, Working) => true,
            (Ready | Working | Idle | PendingShutdown, Error) => true,
            (Ready | Working | Idle | Error, PendingShutdown) => true,
            _ => false,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SessionStatus::Spawning => "spawning",
            SessionStatus::Ready => "ready",
            SessionStatus::Working => "working",
            SessionStatus::Idle => "idle",
            SessionStatus::Error => "error",
            SessionStatus::PendingShutdown => "pending_shutdown",
            SessionStatus::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub key: SessionKey,

    pub session_name: String,

    pub process_group_id: i32,

    pub status: SessionStatus,

    /// Command line the session was started with
    pub command: String,

    pub spawned_at: DateTime<Utc>,

    /// Latest output chunk or status change
    pub last_activity: DateTime<Utc>,
}
