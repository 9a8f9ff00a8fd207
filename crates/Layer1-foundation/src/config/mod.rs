//! Config - layered settings
//!
//! - `rigswarm.rs` - RigswarmConfig (global + project merge)

mod rigswarm;

pub use rigswarm::{RigswarmConfig, SessionSettings, RIGSWARM_CONFIG_FILE};
