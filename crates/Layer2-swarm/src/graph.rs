//! Task dependency graph - readiness and cycle diagnostics.

use crate::state::TaskState;
use crate::swarm::SwarmTask;
use std::collections::{HashMap, HashSet};

/// Pending tasks whose every dependency is merged, in original order.
///
/// A dependency naming an issue outside the swarm is never satisfied.
pub fn ready_tasks(tasks: &[SwarmTask]) -> Vec<&SwarmTask> {
    let merged: HashSet<&str> = tasks
        .iter()
        .filter(|t| t.state.is_merged())
        .map(|t| t.issue_id.as_str())
        .collect();

    tasks
        .iter()
        .filter(|t| t.state == TaskState::Pending)
        .filter(|t| t.dependencies.iter().all(|d| merged.contains(d.as_str())))
        .collect()
}

/// Issue ids that lie on a dependency cycle, in original order.
///
/// Such tasks can never become ready. Edges to unknown issues are ignored.
pub fn dependency_cycles(tasks: &[SwarmTask]) -> Vec<String> {
    let index: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.issue_id.as_str(), i))
        .collect();

    let edges: Vec<Vec<usize>> = tasks
        .iter()
        .map(|t| {
            t.dependencies
                .iter()
                .filter_map(|d| index.get(d.as_str()).copied())
                .collect()
        })
        .collect();

    (0..tasks.len())
        .filter(|&start| reaches(&edges, start, start))
        .map(|i| tasks[i].issue_id.clone())
        .collect()
}

/// Unmerged tasks with a dependency that names no task in the swarm
pub fn unknown_dependencies(tasks: &[SwarmTask]) -> Vec<(String, String)> {
    let known: HashSet<&str> = tasks.iter().map(|t| t.issue_id.as_str()).collect();
    let known = &known;
    tasks
        .iter()
        .filter(|t| !t.state.is_merged())
        .flat_map(move |t| {
            t.dependencies
                .iter()
                .filter(move |d| !known.contains(d.as_str()))
                .map(move |d| (t.issue_id.clone(), d.clone()))
        })
        .collect()
}

/// Whether `target` is reachable from `from` through at least one edge
fn reaches(edges: &[Vec<usize>], from: usize, target: usize) -> bool {
    let mut seen = vec![false; edges.len()];
    let mut stack: Vec<usize> = edges[from].clone();

    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if seen[node] {
            continue;
        }
        seen[node] = true;
        stack.extend(edges[node].iter().copied());
    }

    false
}
