//! rigswarm plan command
//!
//! Loads an epic file and drives an in-memory Swarm Manager to show the
//! order in which workers would pick up tasks. Every assigned task is
//! treated as merged at the end of its wave.

use anyhow::Context;
use rigswarm_swarm::graph;
use rigswarm_swarm::{Rig, SwarmManager, SwarmState, TaskRecord, TaskState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Epic file layout
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpicFile {
    pub id: String,

    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    pub workers: Vec<String>,

    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

fn default_base_branch() -> String {
    "main".to_string()
}

/// One task picked up in a wave
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTask {
    pub issue_id: String,
    pub worker: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub swarm_id: String,
    pub final_state: SwarmState,
    pub waves: Vec<Vec<PlannedTask>>,

    /// Tasks on a dependency cycle
    pub cycles: Vec<String>,

    /// (task, missing dependency)
    pub unknown_dependencies: Vec<(String, String)>,

    /// Every task never scheduled, for whatever reason
    pub unscheduled: Vec<String>,
}

pub fn run(path: &Path, rig: &str, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading epic file {}", path.display()))?;
    let epic: EpicFile = serde_json::from_str(&text)
        .with_context(|| format!("parsing epic file {}", path.display()))?;

    let report = plan(epic, rig)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Simulate the epic wave by wave
pub fn plan(epic: EpicFile, rig: &str) -> anyhow::Result<PlanReport> {
    let manager = SwarmManager::new(Rig::new(rig, "."));
    let id = epic.id.clone();

    manager.create(&id, epic.workers, &epic.base_branch)?;
    manager.load_tasks(&id, epic.tasks)?;
    manager.start(&id)?;

    let mut waves = Vec::new();
    loop {
        let ready = manager.get_ready_tasks(&id)?;
        let idle = manager.idle_workers(&id)?;
        if ready.is_empty() || idle.is_empty() {
            break;
        }

        let mut wave = Vec::new();
        for (task, worker) in ready.iter().zip(idle) {
            manager.assign_task(&id, &task.issue_id, &worker)?;
            wave.push(PlannedTask {
                issue_id: task.issue_id.clone(),
                worker,
            });
        }
        for planned in &wave {
            manager.update_task_state(&id, &planned.issue_id, TaskState::Merged)?;
        }
        debug!(swarm = %id, wave = waves.len() + 1, tasks = wave.len(), "Planned wave");
        waves.push(wave);
    }

    if manager.is_complete(&id)? {
        manager.update_state(&id, SwarmState::Merging)?;
        manager.update_state(&id, SwarmState::Landed)?;
    }

    let swarm = manager.get_swarm(&id)?;
    info!(swarm = %id, waves = waves.len(), state = %swarm.state, "Plan finished");
    Ok(PlanReport {
        swarm_id: id.clone(),
        final_state: swarm.state,
        waves,
        cycles: manager.dependency_cycles(&id)?,
        unknown_dependencies: graph::unknown_dependencies(&swarm.tasks),
        unscheduled: swarm
            .tasks
            .iter()
            .filter(|t| t.state == TaskState::Pending)
            .map(|t| t.issue_id.clone())
            .collect(),
    })
}

fn print_report(report: &PlanReport) {
    println!("\nPlan for {}\n", report.swarm_id);

    for (i, wave) in report.waves.iter().enumerate() {
        println!("Wave {}", i + 1);
        for task in wave {
            println!("  {} {:<20} -> {}", TaskState::Merged.symbol(), task.issue_id, task.worker);
        }
    }

    if report.waves.is_empty() {
        println!("No task can be scheduled.");
    }

    if !report.unscheduled.is_empty() {
        println!("\nUnscheduled:");
        for issue in &report.unscheduled {
            println!("  {} {}", TaskState::Pending.symbol(), issue);
        }
        for issue in &report.cycles {
            println!("  ! {} is on a dependency cycle", issue);
        }
        for (issue, dep) in &report.unknown_dependencies {
            println!("  ! {} depends on unknown task {}", issue, dep);
        }
    }

    println!("\nFinal state: {}", report.final_state);
}
