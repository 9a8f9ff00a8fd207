//! # rigswarm-foundation
//!
//! Foundation layer for rigswarm:
//! - Error: shared error type for config and storage
//! - Storage: JSON file store (global + project directories)
//! - Config: layered settings (`RigswarmConfig`, `SessionSettings`)
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  rigswarm-cli                                │
//! │        │                                     │
//! │  rigswarm-dispatch                           │
//! │        │                 │                   │
//! │  rigswarm-swarm    rigswarm-session          │
//! │        └────────┬────────┘                   │
//! │         rigswarm-foundation                  │
//! └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{RigswarmConfig, SessionSettings, RIGSWARM_CONFIG_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;
