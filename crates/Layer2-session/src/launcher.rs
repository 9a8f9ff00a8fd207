//! Session launchers
//!
//! [`PtyLauncher`] starts the worker command inside a fresh pseudo-terminal.
//! On unix the PTY child calls `setsid`, so it leads a new session and
//! process group whose id equals its pid.

use crate::error::{Result, SessionError};
use crate::output::OutputBuffer;
use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{debug, info};

/// What to start
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub session_name: String,

    /// Program and arguments
    pub argv: Vec<String>,

    pub cwd: Option<PathBuf>,

    /// Extra environment for the session
    pub env: Vec<(String, String)>,

    pub rows: u16,

    pub cols: u16,

    /// Output lines to retain
    pub output_lines: usize,
}

/// A started session, handed to the controller
pub struct LaunchedSession {
    pub process_group_id: i32,

    /// Filled by a background reader
    pub output: OutputBuffer,

    /// Session input (keystrokes)
    pub input: Box<dyn Write + Send>,

    pub process: Box<dyn SessionProcess>,
}

/// Handle on the session leader process
pub trait SessionProcess: Send {
    /// Reap the leader if it has exited; true once it has
    fn has_exited(&mut self) -> bool;
}

/// Starts sessions for the controller
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedSession>;

    /// Launcher name for logs
    fn name(&self) -> &'static str;
}

/// Launches sessions in a native pseudo-terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct PtyLauncher;

impl PtyLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionLauncher for PtyLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedSession> {
        let (program, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| SessionError::Spawn("empty command".to_string()))?;

        let pty_system = native_pty_system();
        let size = PtySize {
            rows: spec.rows,
            cols: spec.cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        let pair = pty_system
            .openpty(size)
            .map_err(|e| SessionError::Spawn(format!("Failed to open PTY: {}", e)))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        if let Some(ref cwd) = spec.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        info!(session = %spec.session_name, command = ?spec.argv, "Spawning PTY session");

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::Spawn(format!("Failed to spawn PTY command: {}", e)))?;
        // only the child may hold the slave side, or the reader never sees EOF
        drop(pair.slave);

        let pid = match child.process_id() {
            Some(pid) => pid,
            None => {
                let _ = child.kill();
                return Err(SessionError::Spawn(format!(
                    "no process id for session {}",
                    spec.session_name
                )));
            }
        };
        let process_group_id = i32::try_from(pid)
            .map_err(|_| SessionError::Spawn(format!("process id {} out of range", pid)))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::Spawn(format!("Failed to clone PTY reader: {}", e)))?;
        let input = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::Spawn(format!("Failed to take PTY writer: {}", e)))?;

        let output = OutputBuffer::new(spec.output_lines);
        spawn_reader(reader, output.clone(), spec.session_name.clone());

        Ok(LaunchedSession {
            process_group_id,
            output,
            input,
            process: Box::new(PtyProcess {
                child,
                _master: pair.master,
            }),
        })
    }

    fn name(&self) -> &'static str {
        "pty"
    }
}

/// Copy terminal output into the buffer until the PTY closes
fn spawn_reader(mut reader: Box<dyn Read + Send>, output: OutputBuffer, session_name: String) {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => output.push_bytes(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                // EIO once the last slave fd closes
                Err(_) => break,
            }
        }
        output.close();
        debug!(session = %session_name, bytes = output.total_bytes(), "PTY reader finished");
    });
}

/// PTY child plus the master side that keeps the terminal open
struct PtyProcess {
    child: Box<dyn Child + Send + Sync>,
    _master: Box<dyn MasterPty + Send>,
}

impl SessionProcess for PtyProcess {
    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }
}
