//! Session Controller configuration

use rigswarm_foundation::SessionSettings;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings of a [`SessionController`](crate::SessionController)
#[derive(Debug, Clone)]
pub struct SessionControllerConfig {
    /// Worker command line
    pub command: String,

    /// Shell that runs `command` with `-c`; empty runs the split command directly
    pub shell: String,

    /// Output marker that means the worker is ready
    pub ready_marker: String,

    pub ready_timeout: Duration,

    pub poll_interval: Duration,

    pub grace_period: Duration,

    /// Lines of output kept per session
    pub output_lines: usize,

    /// How many trailing lines readiness checks look at
    pub ready_scan_lines: usize,

    pub pty_rows: u16,

    pub pty_cols: u16,

    /// Working directory for new sessions (rig checkout)
    pub working_dir: Option<PathBuf>,
}

impl Default for SessionControllerConfig {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for SessionControllerConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            command: settings.command.clone(),
            shell: settings.shell.clone(),
            ready_marker: settings.ready_marker.clone(),
            ready_timeout: settings.ready_timeout(),
            poll_interval: settings.poll_interval(),
            grace_period: settings.grace_period(),
            output_lines: settings.output_lines,
            ready_scan_lines: 10,
            pty_rows: settings.pty_rows,
            pty_cols: settings.pty_cols,
            working_dir: None,
        }
    }
}

impl SessionControllerConfig {
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Argument vector for a command line under this config
    pub fn argv(&self, command: &str) -> Option<Vec<String>> {
        if command.trim().is_empty() {
            return None;
        }
        if self.shell.is_empty() {
            shlex::split(command).filter(|args| !args.is_empty())
        } else {
            Some(vec![self.shell.clone(), "-c".to_string(), command.to_string()])
        }
    }
}
