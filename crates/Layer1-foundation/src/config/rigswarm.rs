//! Rigswarm Config - layered settings
//!
//! The global store is read first, then the project store; values the
//! project file sets away from their defaults win.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Config file name inside each store
pub const RIGSWARM_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Rigswarm Config
// ============================================================================

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RigswarmConfig {
    /// Schema version (for migrations)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Worker session settings
    #[serde(default)]
    pub session: SessionSettings,
}

impl Default for RigswarmConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
            session: SessionSettings::default(),
        }
    }
}

impl RigswarmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Global + current project, merged
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<RigswarmConfig>(RIGSWARM_CONFIG_FILE)? {
                debug!(path = %global.file_path(RIGSWARM_CONFIG_FILE).display(), "loaded global config");
                config.merge(global_config);
            }
        }

        let project = JsonStore::current_project()?;
        config.merge_from(&project)?;

        config.validate()?;
        Ok(config)
    }

    /// Merge one store's file on top of this config, if the file exists
    pub fn merge_from(&mut self, store: &JsonStore) -> Result<()> {
        if let Some(overlay) = store.load_optional::<RigswarmConfig>(RIGSWARM_CONFIG_FILE)? {
            debug!(path = %store.file_path(RIGSWARM_CONFIG_FILE).display(), "loaded config overlay");
            self.merge(overlay);
        }
        Ok(())
    }

    /// Save into the given store
    pub fn save(&self, store: &JsonStore) -> Result<()> {
        store.save(RIGSWARM_CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Merge another config on top (`other` wins where it differs from defaults)
    pub fn merge(&mut self, other: RigswarmConfig) {
        if other.version != default_version() {
            self.version = other.version;
        }
        if other.log_level != default_log_level() {
            self.log_level = other.log_level;
        }
        self.session.merge(other.session);
    }

    /// Reject settings that would make the session controller misbehave
    pub fn validate(&self) -> Result<()> {
        let s = &self.session;
        if s.command.trim().is_empty() {
            return Err(Error::Validation("session.command must not be empty".to_string()));
        }
        if s.ready_marker.is_empty() {
            return Err(Error::Validation("session.readyMarker must not be empty".to_string()));
        }
        if s.poll_interval_ms == 0 {
            return Err(Error::Validation("session.pollIntervalMs must be positive".to_string()));
        }
        if s.output_lines == 0 {
            return Err(Error::Validation("session.outputLines must be positive".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Session Settings
// ============================================================================

/// Worker session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Worker command launched in each session
    #[serde(default = "default_command")]
    pub command: String,

    /// Shell used to run `command`
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Output marker that signals the worker is ready for input
    #[serde(default = "default_ready_marker")]
    pub ready_marker: String,

    /// `wait_ready` default timeout (seconds)
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Delay between readiness samples (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// `terminate` default grace period (seconds)
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Lines of session output kept per worker
    #[serde(default = "default_output_lines")]
    pub output_lines: usize,

    #[serde(default = "default_pty_rows")]
    pub pty_rows: u16,

    #[serde(default = "default_pty_cols")]
    pub pty_cols: u16,

    /// Text sent to a freshly ready worker to start it
    #[serde(default = "default_trigger_text")]
    pub trigger_text: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            shell: default_shell(),
            ready_marker: default_ready_marker(),
            ready_timeout_secs: default_ready_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            grace_period_secs: default_grace_period_secs(),
            output_lines: default_output_lines(),
            pty_rows: default_pty_rows(),
            pty_cols: default_pty_cols(),
            trigger_text: default_trigger_text(),
        }
    }
}

impl SessionSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    fn merge(&mut self, other: SessionSettings) {
        if other.command != default_command() {
            self.command = other.command;
        }
        if other.shell != default_shell() {
            self.shell = other.shell;
        }
        if other.ready_marker != default_ready_marker() {
            self.ready_marker = other.ready_marker;
        }
        if other.ready_timeout_secs != default_ready_timeout_secs() {
            self.ready_timeout_secs = other.ready_timeout_secs;
        }
        if other.poll_interval_ms != default_poll_interval_ms() {
            self.poll_interval_ms = other.poll_interval_ms;
        }
        if other.grace_period_secs != default_grace_period_secs() {
            self.grace_period_secs = other.grace_period_secs;
        }
        if other.output_lines != default_output_lines() {
            self.output_lines = other.output_lines;
        }
        if other.pty_rows != default_pty_rows() {
            self.pty_rows = other.pty_rows;
        }
        if other.pty_cols != default_pty_cols() {
            self.pty_cols = other.pty_cols;
        }
        if other.trigger_text != default_trigger_text() {
            self.trigger_text = other.trigger_text;
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn default_version() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

fn default_ready_marker() -> String {
    "> ".to_string()
}

fn default_ready_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_grace_period_secs() -> u64 {
    5
}

fn default_output_lines() -> usize {
    2000
}

fn default_pty_rows() -> u16 {
    24
}

fn default_pty_cols() -> u16 {
    120
}

fn default_trigger_text() -> String {
    "Begin.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RigswarmConfig::new();
        assert_eq!(config.version, 1);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.session.ready_marker, "> ");
        assert_eq!(config.session.ready_timeout(), Duration::from_secs(60));
        assert_eq!(config.session.grace_period(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "session": { "command": "bash", "readyTimeoutSecs": 10 } }"#;
        let config: RigswarmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.session.command, "bash");
        assert_eq!(config.session.ready_timeout_secs, 10);
        assert_eq!(config.session.trigger_text, "Begin.");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_merge() {
        let mut base = RigswarmConfig::new();
        base.session.command = "claude --resume".to_string();
        base.session.grace_period_secs = 9;

        let mut overlay = RigswarmConfig::new();
        overlay.log_level = "debug".to_string();
        overlay.session.grace_period_secs = 2;

        base.merge(overlay);

        assert_eq!(base.log_level, "debug");
        // overlay left the command at its default, so the base value stays
        assert_eq!(base.session.command, "claude --resume");
        assert_eq!(base.session.grace_period_secs, 2);
    }

    #[test]
    fn test_merge_from_project_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::project(dir.path());

        let mut project = RigswarmConfig::new();
        project.session.ready_marker = "$ ".to_string();
        project.save(&store).unwrap();

        let mut config = RigswarmConfig::new();
        config.merge_from(&store).unwrap();
        assert_eq!(config.session.ready_marker, "$ ");
    }

    #[test]
    fn test_validate_rejects_empty_marker() {
        let mut config = RigswarmConfig::new();
        config.session.ready_marker.clear();
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }
}
