//! Swarm and task records

use crate::graph;
use crate::state::{SwarmState, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The repository a manager orchestrates work against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rig {
    /// Rig name (used in session names)
    pub name: String,

    /// Path to the rig's working tree
    pub path: PathBuf,
}

impl Rig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// A task as supplied by the issue tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub issue_id: String,

    #[serde(default)]
    pub title: String,

    /// Issue ids that must be merged first
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl TaskRecord {
    pub fn new(issue_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            title: title.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, issue_id: impl Into<String>) -> Self {
        self.dependencies.push(issue_id.into());
        self
    }
}

/// One unit of work inside a swarm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmTask {
    pub issue_id: String,

    pub title: String,

    pub state: TaskState,

    /// Worker name, empty until assigned
    pub assignee: String,

    pub dependencies: Vec<String>,

    /// Set once, on first assignment
    pub assigned_at: Option<DateTime<Utc>>,

    /// Set once, on first merge
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<TaskRecord> for SwarmTask {
    fn from(record: TaskRecord) -> Self {
        Self {
            issue_id: record.issue_id,
            title: record.title,
            state: TaskState::Pending,
            assignee: String::new(),
            dependencies: record.dependencies,
            assigned_at: None,
            merged_at: None,
        }
    }
}

impl SwarmTask {
    pub fn is_assigned(&self) -> bool {
        self.state == TaskState::Assigned
    }
}

/// One epic-level orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swarm {
    pub id: String,

    /// Rig this swarm runs against
    pub rig: String,

    pub state: SwarmState,

    /// Target branch for merges
    pub base_branch: String,

    /// Fixed at creation
    pub workers: Vec<String>,

    pub tasks: Vec<SwarmTask>,

    /// Cancellation reason, empty unless cancelled
    pub error: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Swarm {
    pub(crate) fn new(
        id: impl Into<String>,
        rig: impl Into<String>,
        workers: Vec<String>,
        base_branch: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            rig: rig.into(),
            state: SwarmState::Created,
            base_branch: base_branch.into(),
            workers,
            tasks: Vec::new(),
            error: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Find a task by issue id
    pub fn task(&self, issue_id: &str) -> Option<&SwarmTask> {
        self.tasks.iter().find(|t| t.issue_id == issue_id)
    }

    pub(crate) fn task_mut(&mut self, issue_id: &str) -> Option<&mut SwarmTask> {
        self.tasks.iter_mut().find(|t| t.issue_id == issue_id)
    }

    /// Pending tasks whose dependencies are all merged, in insertion order
    pub fn ready_tasks(&self) -> Vec<&SwarmTask> {
        graph::ready_tasks(&self.tasks)
    }

    /// At least one task, and all of them merged
    pub fn is_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.state.is_merged())
    }

    /// Roster members not currently holding an assigned task
    pub fn idle_workers(&self) -> Vec<&str> {
        self.workers
            .iter()
            .filter(|w| {
                !self
                    .tasks
                    .iter()
                    .any(|t| t.is_assigned() && &t.assignee == *w)
            })
            .map(String::as_str)
            .collect()
    }

    /// Worker currently holding `issue_id`, if any
    pub fn assignee_of(&self, issue_id: &str) -> Option<&str> {
        self.task(issue_id)
            .filter(|t| t.is_assigned())
            .map(|t| t.assignee.as_str())
    }

    /// Count of tasks per state: (pending, assigned, merged)
    pub fn progress(&self) -> (usize, usize, usize) {
        self.tasks
            .iter()
            .fold((0, 0, 0), |(p, a, m), t| match t.state {
                TaskState::Pending => (p + 1, a, m),
                TaskState::Assigned => (p, a + 1, m),
                TaskState::Merged => (p, a, m + 1),
            })
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
