//! # rigswarm-swarm
//!
//! Swarm Manager for rigswarm.
//! Owns the authoritative table of swarms and their tasks for one rig.
//!
//! ## Features
//!
//! - Table-driven swarm lifecycle (`Created → Active → Merging → Landed`, `→ Cancelled`)
//! - Task assignment with exclusive ownership (`Pending → Assigned → Merged`)
//! - Dependency-aware readiness and cycle diagnostics
//! - One lock per manager; every call is a single linearizable read-modify-write

pub mod error;
pub mod graph;
pub mod manager;
pub mod state;
pub mod swarm;

pub use error::{Result, SwarmError};
pub use manager::SwarmManager;
pub use state::{SwarmState, TaskState};
pub use swarm::{Rig, Swarm, SwarmTask, TaskRecord};
