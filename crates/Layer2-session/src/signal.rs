//! Process-group signaling
//!
//! A worker session runs as its own process group, so anything the worker
//! forks (shells, compilers, test runners) is reached by signaling the
//! negated group id. Targets without process groups get a signaler that
//! reports `Unsupported` for every request.

use std::sync::Arc;

/// Signals the controller sends to a session's group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Polite shutdown (SIGTERM)
    Terminate,

    /// Forced shutdown (SIGKILL)
    Kill,

    /// Existence check only (signal 0)
    Probe,
}

/// Result of one signaling attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Delivered, or for `Probe`: the group exists
    Delivered,

    /// No process left in the group
    NoSuchGroup,

    /// This platform cannot signal process groups
    Unsupported,

    /// Delivery failed for another reason
    Failed(String),
}

/// Capability to signal a whole process group
pub trait GroupSignaler: Send + Sync {
    fn signal_group(&self, pgid: i32, signal: Signal) -> SignalOutcome;

    /// Signaler name for logs
    fn name(&self) -> &'static str;
}

/// `kill(-pgid, sig)` via libc
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixGroupSignaler;

#[cfg(unix)]
impl GroupSignaler for PosixGroupSignaler {
    fn signal_group(&self, pgid: i32, signal: Signal) -> SignalOutcome {
        // 0 is our own group and 1 would broadcast to every process we may signal
        if pgid <= 1 {
            return SignalOutcome::Failed(format!("refusing to signal process group {}", pgid));
        }

        let sig = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
            Signal::Probe => 0,
        };

        // SAFETY: kill(2) has no memory-safety preconditions
        let rc = unsafe { libc::kill(-pgid, sig) };
        if rc == 0 {
            return SignalOutcome::Delivered;
        }

        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => SignalOutcome::NoSuchGroup,
            // group exists but belongs to someone else
            Some(libc::EPERM) if signal == Signal::Probe => SignalOutcome::Delivered,
            _ => SignalOutcome::Failed(err.to_string()),
        }
    }

    fn name(&self) -> &'static str {
        "posix"
    }
}

/// Signaler for targets without process groups
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSignaler;

impl GroupSignaler for UnsupportedSignaler {
    fn signal_group(&self, _pgid: i32, _signal: Signal) -> SignalOutcome {
        SignalOutcome::Unsupported
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

/// Signaler for the current platform
pub fn platform_signaler() -> Arc<dyn GroupSignaler> {
    #[cfg(unix)]
    {
        Arc::new(PosixGroupSignaler)
    }
    #[cfg(not(unix))]
    {
        Arc::new(UnsupportedSignaler)
    }
}
