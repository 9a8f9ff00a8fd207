//! Dispatcher - drives a swarm through its sessions
//!
//! A patrol loop typically calls, per tick:
//! 1. `dispatch_ready` - pair ready tasks with idle workers and spawn sessions
//! 2. `trigger_ready` - wait for fresh sessions to show their prompt, then start them
//! 3. `complete_task` - once a worker's branch has merged
//!
//! and `shutdown` to abandon the epic.

use crate::error::Result;
use rigswarm_foundation::SessionSettings;
use rigswarm_session::{
    ReadyOutcome, SessionController, SessionError, SessionInfo, SessionKey, SessionStatus,
    TerminateOutcome,
};
use rigswarm_swarm::{SwarmError, SwarmManager, SwarmState, TaskState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to the session of a fresh assignment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnOutcome {
    Spawned(SessionInfo),

    /// The worker already had a live session
    Reused,

    /// The assignment stands; retrying the spawn is up to the caller
    Failed(String),
}

/// One task handed to one worker
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub issue_id: String,
    pub worker: String,
    pub spawn: SpawnOutcome,
}

/// Readiness result for one worker session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub worker: String,
    pub outcome: ReadyOutcome,

    /// Trigger text was delivered
    pub nudged: bool,

    /// Why the trigger could not be delivered; other workers still are
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of merging one task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// Every task of the swarm is merged
    pub swarm_complete: bool,

    /// Teardown of the assignee's session, if it had one
    pub terminated: Option<TerminateOutcome>,
}

/// Composes a [`SwarmManager`] with a [`SessionController`]
pub struct Dispatcher {
    manager: SwarmManager,
    sessions: Arc<SessionController>,
    trigger_text: String,
}

impl Dispatcher {
    pub fn new(manager: SwarmManager, sessions: Arc<SessionController>) -> Self {
        Self::from_settings(manager, sessions, &SessionSettings::default())
    }

    pub fn from_settings(
        manager: SwarmManager,
        sessions: Arc<SessionController>,
        settings: &SessionSettings,
    ) -> Self {
        Self {
            manager,
            sessions,
            trigger_text: settings.trigger_text.clone(),
        }
    }

    pub fn with_trigger_text(mut self, text: impl Into<String>) -> Self {
        self.trigger_text = text.into();
        self
    }

    pub fn manager(&self) -> &SwarmManager {
        &self.manager
    }

    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    fn key(&self, worker: &str) -> SessionKey {
        SessionKey::new(self.manager.rig().name.clone(), worker)
    }

    /// Assign ready tasks to idle workers (both in order) and spawn their sessions.
    ///
    /// Only an `Active` swarm dispatches.
    pub async fn dispatch_ready(&self, swarm_id: &str) -> Result<Vec<Assignment>> {
        let state = self.manager.get_swarm(swarm_id)?.state;
        if state != SwarmState::Active {
            debug!(swarm = swarm_id, %state, "Swarm not active, nothing to dispatch");
            return Ok(Vec::new());
        }

        let ready = self.manager.get_ready_tasks(swarm_id)?;
        let idle = self.manager.idle_workers(swarm_id)?;

        let mut assignments = Vec::new();
        for (task, worker) in ready.iter().zip(idle) {
            match self.manager.assign_task(swarm_id, &task.issue_id, &worker) {
                Ok(()) => {}
                // someone else took it between the query and now
                Err(SwarmError::InvalidTaskState { .. }) => {
                    debug!(swarm = swarm_id, task = %task.issue_id, "Task no longer pending");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            let spawn = match self.sessions.spawn(&self.key(&worker)).await {
                Ok(info) => SpawnOutcome::Spawned(info),
                Err(SessionError::AlreadyExists(_)) => SpawnOutcome::Reused,
                Err(e) => {
                    warn!(swarm = swarm_id, %worker, error = %e, "Session spawn failed");
                    SpawnOutcome::Failed(e.to_string())
                }
            };

            assignments.push(Assignment {
                issue_id: task.issue_id.clone(),
                worker,
                spawn,
            });
        }

        if !assignments.is_empty() {
            info!(swarm = swarm_id, count = assignments.len(), "Dispatched tasks");
        }
        Ok(assignments)
    }

    /// Wait for each roster session still spawning, then send the trigger text
    pub async fn trigger_ready(&self, swarm_id: &str, timeout: Duration) -> Result<Vec<Trigger>> {
        let workers = self.manager.get_swarm(swarm_id)?.workers;

        let mut triggers = Vec::new();
        for worker in workers {
            let key = self.key(&worker);
            match self.sessions.status(&key).await {
                Ok(SessionStatus::Spawning) => {}
                Ok(_) => continue,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }

            let (outcome, result) = match self.sessions.wait_ready(&key, timeout).await {
                Ok(ReadyOutcome::Ready) => (ReadyOutcome::Ready, self.start_worker(&key).await),
                Ok(outcome) => (outcome, Ok(false)),
                Err(e) => (ReadyOutcome::TimedOut, Err(e)),
            };
            let (nudged, error) = match result {
                Ok(nudged) => (nudged, None),
                Err(e) => {
                    warn!(session = %key, error = %e, "Failed to trigger worker");
                    (false, Some(e.to_string()))
                }
            };

            triggers.push(Trigger {
                worker,
                outcome,
                nudged,
                error,
            });
        }
        Ok(triggers)
    }

    /// Send the trigger text and mark the session working
    async fn start_worker(&self, key: &SessionKey) -> rigswarm_session::Result<bool> {
        self.sessions.nudge(key, &self.trigger_text).await?;
        self.sessions.set_status(key, SessionStatus::Working).await?;
        Ok(true)
    }

    /// Mark a task merged and tear down its worker's session
    pub async fn complete_task(
        &self,
        swarm_id: &str,
        issue_id: &str,
        grace_period: Duration,
    ) -> Result<Completion> {
        self.manager
            .update_task_state(swarm_id, issue_id, TaskState::Merged)?;

        let swarm = self.manager.get_swarm(swarm_id)?;
        let assignee = swarm
            .task(issue_id)
            .map(|t| t.assignee.clone())
            .unwrap_or_default();

        let terminated = if assignee.is_empty() {
            None
        } else {
            self.terminate_if_recorded(&assignee, grace_period).await?
        };

        let swarm_complete = swarm.is_complete();
        info!(swarm = swarm_id, task = issue_id, swarm_complete, "Task completed");
        Ok(Completion {
            swarm_complete,
            terminated,
        })
    }

    /// Cancel the swarm, then terminate every roster session still recorded
    pub async fn shutdown(
        &self,
        swarm_id: &str,
        reason: &str,
        grace_period: Duration,
    ) -> Result<Vec<(String, TerminateOutcome)>> {
        self.manager.cancel(swarm_id, reason)?;
        let workers = self.manager.get_swarm(swarm_id)?.workers;

        let mut outcomes = Vec::new();
        for worker in workers {
            if let Some(outcome) = self.terminate_if_recorded(&worker, grace_period).await? {
                outcomes.push((worker, outcome));
            }
        }

        info!(swarm = swarm_id, sessions = outcomes.len(), "Swarm shut down");
        Ok(outcomes)
    }

    async fn terminate_if_recorded(
        &self,
        worker: &str,
        grace_period: Duration,
    ) -> Result<Option<TerminateOutcome>> {
        match self.sessions.terminate(&self.key(worker), grace_period).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
