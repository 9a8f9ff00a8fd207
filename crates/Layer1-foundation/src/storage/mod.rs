//! Storage module for rigswarm
//!
//! - `json`: JSON - config file load/save

mod json;

pub use json::JsonStore;
