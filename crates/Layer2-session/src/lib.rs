//! # rigswarm-session
//!
//! Worker Session Controller for rigswarm.
//! Creates, probes and tears down the interactive OS sessions that back
//! each worker.
//!
//! ## Features
//!
//! - PTY-backed sessions, one process group per worker
//! - Readiness polling against a prompt marker, always bounded by a timeout
//! - Group teardown: SIGTERM, grace period, then SIGKILL
//! - Output capture with ANSI escapes stripped
//!
//! ## Platform support
//!
//! Group signaling sits behind [`GroupSignaler`]. Unix targets use
//! [`PosixGroupSignaler`]; elsewhere [`UnsupportedSignaler`] reports
//! `Unsupported` instead of pretending teardown worked.

pub mod config;
pub mod controller;
pub mod error;
pub mod launcher;
pub mod output;
pub mod session;
pub mod signal;

pub use config::SessionControllerConfig;
pub use controller::{ReadyOutcome, SessionController, TerminateOutcome};
pub use error::{Result, SessionError};
pub use launcher::{LaunchSpec, LaunchedSession, PtyLauncher, SessionLauncher, SessionProcess};
pub use output::OutputBuffer;
pub use session::{SessionInfo, SessionKey, SessionStatus};
#[cfg(unix)]
pub use signal::PosixGroupSignaler;
pub use signal::{platform_signaler, GroupSignaler, Signal, SignalOutcome, UnsupportedSignaler};
