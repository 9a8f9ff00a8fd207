//! Swarm Manager - authoritative table of swarms and tasks for one rig
//!
//! Features:
//! - Swarm lifecycle through one validated transition table
//! - Exclusive task assignment and merge tracking
//! - Dependency-aware ready queries
//!
//! Every public call takes the manager lock once, validates, then writes.
//! A rejected call leaves the table untouched. The lock is never held
//! while talking to anything outside this table.

use crate::error::{Result, SwarmError};
use crate::graph;
use crate::state::{SwarmState, TaskState};
use crate::swarm::{Rig, Swarm, SwarmTask, TaskRecord};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Swarm Manager - owns the swarm/task table for one rig.
///
/// Cloning shares the same table, so one instance can be handed to every
/// patrol loop that needs it.
#[derive(Clone)]
pub struct SwarmManager {
    rig: Arc<Rig>,

    /// All swarms by id
    swarms: Arc<Mutex<HashMap<String, Swarm>>>,
}

impl SwarmManager {
    /// Create an empty manager for a rig
    pub fn new(rig: Rig) -> Self {
        Self {
            rig: Arc::new(rig),
            swarms: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    /// Run `f` against one swarm under the lock
    fn with_swarm<T>(&self, id: &str, f: impl FnOnce(&mut Swarm) -> Result<T>) -> Result<T> {
        let mut swarms = self.swarms.lock();
        let swarm = swarms
            .get_mut(id)
            .ok_or_else(|| SwarmError::NotFound(id.to_string()))?;
        f(swarm)
    }

    // ========== Swarm Lifecycle ==========

    /// Register a new swarm with a fixed worker roster
    pub fn create(
        &self,
        id: &str,
        workers: Vec<String>,
        base_branch: &str,
    ) -> Result<Swarm> {
        if id.trim().is_empty() {
            return Err(SwarmError::InvalidInput("swarm id must not be empty".to_string()));
        }
        if workers.is_empty() {
            return Err(SwarmError::InvalidInput(format!(
                "swarm {} needs at least one worker",
                id
            )));
        }

        let mut swarms = self.swarms.lock();
        if swarms.contains_key(id) {
            return Err(SwarmError::AlreadyExists(id.to_string()));
        }

        let swarm = Swarm::new(id, self.rig.name.clone(), workers, base_branch);
        swarms.insert(id.to_string(), swarm.clone());

        info!(
            swarm = id,
            rig = %self.rig.name,
            workers = swarm.workers.len(),
            base = base_branch,
            "Created swarm"
        );
        Ok(swarm)
    }

    /// Snapshot of a swarm
    pub fn get_swarm(&self, id: &str) -> Result<Swarm> {
        self.with_swarm(id, |swarm| Ok(swarm.clone()))
    }

    /// Snapshots of every swarm, ordered by id
    pub fn list_swarms(&self) -> Vec<Swarm> {
        let swarms = self.swarms.lock();
        let mut list: Vec<Swarm> = swarms.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// `Created → Active`
    pub fn start(&self, id: &str) -> Result<()> {
        self.update_state(id, SwarmState::Active)
    }

    /// Move a swarm along one edge of the transition table
    pub fn update_state(&self, id: &str, next: SwarmState) -> Result<()> {
        self.with_swarm(id, |swarm| {
            let from = swarm.state;
            if !from.can_transition_to(next) {
                return Err(SwarmError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to: next,
                });
            }

            swarm.state = next;
            swarm.touch();
            info!(swarm = id, %from, to = %next, "Swarm state changed");
            Ok(())
        })
    }

    /// Cancel a non-terminal swarm, recording why.
    ///
    /// Only the record changes; sessions must be torn down separately.
    pub fn cancel(&self, id: &str, reason: &str) -> Result<()> {
        self.with_swarm(id, |swarm| {
            let from = swarm.state;
            if !from.can_transition_to(SwarmState::Cancelled) {
                return Err(SwarmError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to: SwarmState::Cancelled,
                });
            }

            swarm.state = SwarmState::Cancelled;
            swarm.error = reason.to_string();
            swarm.touch();
            warn!(swarm = id, %from, reason, "Swarm cancelled");
            Ok(())
        })
    }

    /// Drop a landed or cancelled swarm from the table
    pub fn remove(&self, id: &str) -> Result<Swarm> {
        let mut swarms = self.swarms.lock();
        let state = swarms
            .get(id)
            .map(|s| s.state)
            .ok_or_else(|| SwarmError::NotFound(id.to_string()))?;
        if !state.is_terminal() {
            return Err(SwarmError::NotTerminal {
                id: id.to_string(),
                state,
            });
        }

        debug!(swarm = id, "Removed swarm");
        swarms
            .remove(id)
            .ok_or_else(|| SwarmError::NotFound(id.to_string()))
    }

    // ========== Tasks ==========

    /// Append issue-tracker records as pending tasks.
    ///
    /// The whole batch is rejected if any issue id repeats.
    pub fn load_tasks(&self, id: &str, records: Vec<TaskRecord>) -> Result<usize> {
        self.with_swarm(id, |swarm| {
            let mut seen: HashSet<&str> = swarm.tasks.iter().map(|t| t.issue_id.as_str()).collect();
            for record in &records {
                if record.issue_id.trim().is_empty() {
                    return Err(SwarmError::InvalidInput(format!(
                        "task in swarm {} has an empty issue id",
                        id
                    )));
                }
                if !seen.insert(record.issue_id.as_str()) {
                    return Err(SwarmError::DuplicateTask {
                        swarm_id: id.to_string(),
                        issue_id: record.issue_id.clone(),
                    });
                }
            }

            let count = records.len();
            swarm.tasks.extend(records.into_iter().map(SwarmTask::from));
            swarm.touch();
            debug!(swarm = id, count, total = swarm.tasks.len(), "Loaded tasks");
            Ok(count)
        })
    }

    /// Pending tasks with every dependency merged, in insertion order
    pub fn get_ready_tasks(&self, id: &str) -> Result<Vec<SwarmTask>> {
        self.with_swarm(id, |swarm| {
            Ok(swarm.ready_tasks().into_iter().cloned().collect())
        })
    }

    /// Bind a pending task to a worker.
    ///
    /// The assignee is not checked against the roster; an outsider is
    /// accepted and logged.
    pub fn assign_task(&self, id: &str, issue_id: &str, assignee: &str) -> Result<()> {
        self.with_swarm(id, |swarm| {
            let on_roster = swarm.workers.iter().any(|w| w == assignee);
            let task = swarm
                .task_mut(issue_id)
                .ok_or_else(|| SwarmError::TaskNotFound {
                    swarm_id: id.to_string(),
                    issue_id: issue_id.to_string(),
                })?;

            if task.state != TaskState::Pending {
                return Err(SwarmError::InvalidTaskState {
                    issue_id: issue_id.to_string(),
                    actual: task.state,
                    expected: TaskState::Pending,
                });
            }

            if !on_roster {
                warn!(swarm = id, task = issue_id, assignee, "Assignee is not on the swarm roster");
            }

            task.assignee = assignee.to_string();
            task.state = TaskState::Assigned;
            if task.assigned_at.is_none() {
                task.assigned_at = Some(Utc::now());
            }
            swarm.touch();

            info!(swarm = id, task = issue_id, assignee, "Assigned task");
            Ok(())
        })
    }

    /// Set a task's state; the first move to `Merged` stamps `merged_at`
    pub fn update_task_state(&self, id: &str, issue_id: &str, next: TaskState) -> Result<()> {
        self.with_swarm(id, |swarm| {
            let task = swarm
                .task_mut(issue_id)
                .ok_or_else(|| SwarmError::TaskNotFound {
                    swarm_id: id.to_string(),
                    issue_id: issue_id.to_string(),
                })?;

            let from = task.state;
            task.state = next;
            if next == TaskState::Merged && task.merged_at.is_none() {
                task.merged_at = Some(Utc::now());
            }
            swarm.touch();

            info!(swarm = id, task = issue_id, %from, to = %next, "Task state changed");
            Ok(())
        })
    }

    /// True iff the swarm has tasks and all of them are merged
    pub fn is_complete(&self, id: &str) -> Result<bool> {
        self.with_swarm(id, |swarm| Ok(swarm.is_complete()))
    }

    // ========== Queries ==========

    /// Roster members with no assigned task, in roster order
    pub fn idle_workers(&self, id: &str) -> Result<Vec<String>> {
        self.with_swarm(id, |swarm| {
            Ok(swarm.idle_workers().into_iter().map(str::to_string).collect())
        })
    }

    /// Tasks sitting on a dependency cycle (they will never be ready)
    pub fn dependency_cycles(&self, id: &str) -> Result<Vec<String>> {
        self.with_swarm(id, |swarm| Ok(graph::dependency_cycles(&swarm.tasks)))
    }

    /// Number of swarms known to this manager
    pub fn len(&self) -> usize {
        self.swarms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
