//! Session Controller - lifecycle of worker sessions
//!
//! Features:
//! - Spawn one PTY session per (rig, worker)
//! - Bounded readiness polling against the prompt marker
//! - Process-group teardown with SIGTERM -> SIGKILL escalation
//! - Output capture and input nudges
//!
//! The session table and each session entry have their own locks. Neither
//! is held across a sleep or a launch, so a slow call on one session never
//! stalls another. Only `wait_ready` and `terminate` suspend, and both are
//! bounded by a caller supplied duration.

use crate::config::SessionControllerConfig;
use crate::error::{Result, SessionError};
use crate::launcher::{LaunchSpec, PtyLauncher, SessionLauncher, SessionProcess};
use crate::output::OutputBuffer;
use crate::session::{SessionInfo, SessionKey, SessionStatus};
use crate::signal::{platform_signaler, GroupSignaler, Signal, SignalOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long to wait for the leader to be reaped after SIGKILL
const KILL_SETTLE: Duration = Duration::from_millis(500);

/// How long to wait for the reader to drain after the leader exits
const OUTPUT_DRAIN: Duration = Duration::from_millis(200);

/// Result of `wait_ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyOutcome {
    Ready,
    TimedOut,
}

/// Result of `terminate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminateOutcome {
    /// Group exited within the grace period
    Terminated,

    /// Group had to be killed
    ForceTerminated,

    /// Signaling failed; the session may still be running
    Failed(String),

    /// Platform cannot signal process groups
    Unsupported,
}

impl TerminateOutcome {
    /// The group is known to be gone
    pub fn is_success(&self) -> bool {
        matches!(self, TerminateOutcome::Terminated | TerminateOutcome::ForceTerminated)
    }
}

/// Recorded state of one session
struct SessionEntry {
    key: SessionKey,
    process_group_id: i32,
    status: SessionStatus,
    command: String,
    spawned_at: DateTime<Utc>,
    status_changed_at: DateTime<Utc>,
    output: OutputBuffer,
    input: Box<dyn Write + Send>,
    process: Box<dyn SessionProcess>,
}

impl SessionEntry {
    fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.status_changed_at = Utc::now();
    }

    fn last_activity(&self) -> DateTime<Utc> {
        match self.output.last_output() {
            Some(t) if t > self.status_changed_at => t,
            _ => self.status_changed_at,
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            key: self.key.clone(),
            session_name: self.key.session_name(),
            process_group_id: self.process_group_id,
            status: self.status,
            command: self.command.clone(),
            spawned_at: self.spawned_at,
            last_activity: self.last_activity(),
        }
    }
}

/// Worker Session Controller
pub struct SessionController {
    config: SessionControllerConfig,
    launcher: Arc<dyn SessionLauncher>,
    signaler: Arc<dyn GroupSignaler>,

    /// Sessions by key
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<SessionEntry>>>>,
}

impl SessionController {
    /// PTY sessions with this platform's signaler
    pub fn new(config: SessionControllerConfig) -> Self {
        Self::with_parts(config, Arc::new(PtyLauncher::new()), platform_signaler())
    }

    pub fn with_parts(
        config: SessionControllerConfig,
        launcher: Arc<dyn SessionLauncher>,
        signaler: Arc<dyn GroupSignaler>,
    ) -> Self {
        Self {
            config,
            launcher,
            signaler,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SessionControllerConfig {
        &self.config
    }

    async fn entry(&self, key: &SessionKey) -> Result<Arc<Mutex<SessionEntry>>> {
        self.sessions
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(key.session_name()))
    }

    // ========== Spawn ==========

    /// Start the configured worker command for `key`
    pub async fn spawn(&self, key: &SessionKey) -> Result<SessionInfo> {
        let command = self.config.command.clone();
        self.spawn_command(key, &command).await
    }

    /// Start `command` as the session for `key`.
    ///
    /// A terminated record for the key is replaced; any other is an error.
    pub async fn spawn_command(&self, key: &SessionKey, command: &str) -> Result<SessionInfo> {
        let argv = self
            .config
            .argv(command)
            .ok_or_else(|| SessionError::Spawn(format!("cannot parse command: {:?}", command)))?;

        let existing = self.sessions.read().await.get(key).cloned();
        if let Some(existing) = &existing {
            if !existing.lock().await.status.is_terminated() {
                return Err(SessionError::AlreadyExists(key.session_name()));
            }
        }

        let spec = LaunchSpec {
            session_name: key.session_name(),
            argv,
            cwd: self.config.working_dir.clone(),
            env: vec![
                ("RIGSWARM_RIG".to_string(), key.rig.clone()),
                ("RIGSWARM_WORKER".to_string(), key.worker.clone()),
                ("RIGSWARM_SESSION".to_string(), key.session_name()),
            ],
            rows: self.config.pty_rows,
            cols: self.config.pty_cols,
            output_lines: self.config.output_lines,
        };

        let mut launched = self.launcher.launch(&spec).await?;

        let mut sessions = self.sessions.write().await;
        let unchanged = match (sessions.get(key), &existing) {
            (None, None) => true,
            (Some(current), Some(seen)) => Arc::ptr_eq(current, seen),
            _ => false,
        };
        if !unchanged {
            drop(sessions);
            // lost a race with another spawn of the same key
            self.signaler.signal_group(launched.process_group_id, Signal::Kill);
            launched.process.has_exited();
            warn!(session = %key, pgid = launched.process_group_id, "Concurrent spawn, discarded new session");
            return Err(SessionError::AlreadyExists(key.session_name()));
        }

        let now = Utc::now();
        let entry = SessionEntry {
            key: key.clone(),
            process_group_id: launched.process_group_id,
            status: SessionStatus::Spawning,
            command: command.to_string(),
            spawned_at: now,
            status_changed_at: now,
            output: launched.output,
            input: launched.input,
            process: launched.process,
        };
        let info = entry.info();
        sessions.insert(key.clone(), Arc::new(Mutex::new(entry)));
        drop(sessions);

        info!(
            session = %key,
            pgid = info.process_group_id,
            launcher = self.launcher.name(),
            "Session spawned"
        );
        Ok(info)
    }

    // ========== Readiness ==========

    /// Poll recent output for the ready marker until it shows or `timeout` passes.
    ///
    /// A `Spawning` session that shows the marker becomes `Ready`.
    pub async fn wait_ready(&self, key: &SessionKey, timeout: Duration) -> Result<ReadyOutcome> {
        let entry = self.entry(key).await?;
        let marker = self.config.ready_marker.as_str();
        let deadline = Instant::now() + timeout;
        let mut exited_at: Option<Instant> = None;

        loop {
            {
                let mut e = entry.lock().await;
                if e.status.is_terminated() {
                    return Ok(ReadyOutcome::TimedOut);
                }
                // read before the marker check: once closed, the buffer is final
                let drained = e.output.is_closed();
                if e.output.contains_recent(marker, self.config.ready_scan_lines) {
                    if e.status == SessionStatus::Spawning {
                        e.set_status(SessionStatus::Ready);
                    }
                    info!(session = %key, status = %e.status, "Session ready");
                    return Ok(ReadyOutcome::Ready);
                }
                if e.process.has_exited() {
                    let since = *exited_at.get_or_insert_with(Instant::now);
                    if drained || since.elapsed() >= OUTPUT_DRAIN {
                        debug!(session = %key, "Session exited before becoming ready");
                        return Ok(ReadyOutcome::TimedOut);
                    }
                }
            }

            let now = Instant::now();
            let wait = if exited_at.is_some() {
                // the last chunk may still be in flight
                self.config.poll_interval.min(Duration::from_millis(20))
            } else if now >= deadline {
                warn!(session = %key, ?timeout, "Session not ready before timeout");
                return Ok(ReadyOutcome::TimedOut);
            } else {
                self.config.poll_interval.min(deadline - now)
            };
            debug!(session = %key, "Waiting for ready marker");
            tokio::time::sleep(wait).await;
        }
    }

    // ========== Teardown ==========

    /// Stop the session's whole process group.
    ///
    /// SIGTERM first; if the group outlives `grace_period`, SIGKILL.
    /// Terminating an already terminated session reports `Terminated`.
    pub async fn terminate(&self, key: &SessionKey, grace_period: Duration) -> Result<TerminateOutcome> {
        let entry = self.entry(key).await?;

        let pgid = {
            let mut e = entry.lock().await;
            if e.status.is_terminated() {
                return Ok(TerminateOutcome::Terminated);
            }

            let pgid = e.process_group_id;
            match self.signaler.signal_group(pgid, Signal::Terminate) {
                SignalOutcome::Delivered => {
                    debug!(session = %key, pgid, "Sent SIGTERM to process group");
                }
                SignalOutcome::NoSuchGroup => {
                    e.process.has_exited();
                    e.set_status(SessionStatus::Terminated);
                    info!(session = %key, pgid, "Process group already gone");
                    return Ok(TerminateOutcome::Terminated);
                }
                SignalOutcome::Unsupported => {
                    warn!(session = %key, signaler = self.signaler.name(), "Process groups unsupported on this platform");
                    return Ok(TerminateOutcome::Unsupported);
                }
                SignalOutcome::Failed(reason) => {
                    warn!(session = %key, pgid, %reason, "SIGTERM failed");
                    return Ok(TerminateOutcome::Failed(reason));
                }
            }
            pgid
        };

        // the entry is only locked per probe, never across a sleep
        let deadline = Instant::now() + grace_period;
        loop {
            {
                let mut e = entry.lock().await;
                if e.status.is_terminated() {
                    return Ok(TerminateOutcome::Terminated);
                }
                if !self.group_alive(&mut e) {
                    e.set_status(SessionStatus::Terminated);
                    info!(session = %key, pgid, "Session terminated");
                    return Ok(TerminateOutcome::Terminated);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }

        warn!(session = %key, pgid, ?grace_period, "Grace period expired, sending SIGKILL");
        match self.signaler.signal_group(pgid, Signal::Kill) {
            SignalOutcome::Delivered => {
                let settle = Instant::now() + KILL_SETTLE;
                loop {
                    {
                        let mut e = entry.lock().await;
                        if e.process.has_exited() || Instant::now() >= settle {
                            e.set_status(SessionStatus::Terminated);
                            break;
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                info!(session = %key, pgid, "Session force terminated");
                Ok(TerminateOutcome::ForceTerminated)
            }
            SignalOutcome::NoSuchGroup => {
                entry.lock().await.set_status(SessionStatus::Terminated);
                Ok(TerminateOutcome::Terminated)
            }
            SignalOutcome::Unsupported => Ok(TerminateOutcome::Unsupported),
            SignalOutcome::Failed(reason) => {
                warn!(session = %key, pgid, %reason, "SIGKILL failed");
                Ok(TerminateOutcome::Failed(reason))
            }
        }
    }

    /// Reap the leader, then probe the group
    fn group_alive(&self, e: &mut SessionEntry) -> bool {
        e.process.has_exited();
        !matches!(
            self.signaler.signal_group(e.process_group_id, Signal::Probe),
            SignalOutcome::NoSuchGroup
        )
    }

    /// Whether any process of the session's group is still running
    pub async fn is_alive(&self, key: &SessionKey) -> Result<bool> {
        let entry = self.entry(key).await?;
        let mut e = entry.lock().await;
        if e.status.is_terminated() {
            return Ok(false);
        }
        Ok(match self.signaler.signal_group(e.process_group_id, Signal::Probe) {
            SignalOutcome::NoSuchGroup => false,
            // no group view: fall back to the leader
            SignalOutcome::Unsupported | SignalOutcome::Failed(_) => !e.process.has_exited(),
            // a zombie leader still counts until reaped
            SignalOutcome::Delivered => self.group_alive(&mut e),
        })
    }

    // ========== Interaction ==========

    /// Last `lines` lines of session output
    pub async fn capture(&self, key: &SessionKey, lines: usize) -> Result<Vec<String>> {
        let entry = self.entry(key).await?;
        let e = entry.lock().await;
        Ok(e.output.tail(lines))
    }

    /// Type `text` into the session followed by Enter
    pub async fn nudge(&self, key: &SessionKey, text: &str) -> Result<()> {
        let entry = self.entry(key).await?;
        let mut e = entry.lock().await;
        if e.status.is_terminated() {
            return Err(SessionError::NotRunning(key.session_name()));
        }

        e.input.write_all(text.as_bytes())?;
        e.input.write_all(b"\r")?;
        e.input.flush()?;

        debug!(session = %key, text, "Nudged session");
        Ok(())
    }

    // ========== Status ==========

    /// Record a status reported by the driver.
    ///
    /// `Terminated` is only reached through `terminate`.
    pub async fn set_status(&self, key: &SessionKey, next: SessionStatus) -> Result<()> {
        let entry = self.entry(key).await?;
        let mut e = entry.lock().await;
        let from = e.status;
        if next.is_terminated() || !from.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                session: key.session_name(),
                from,
                to: next,
            });
        }

        e.set_status(next);
        info!(session = %key, %from, to = %next, "Session status changed");
        Ok(())
    }

    pub async fn status(&self, key: &SessionKey) -> Result<SessionStatus> {
        let entry = self.entry(key).await?;
        let status = entry.lock().await.status;
        Ok(status)
    }

    /// Snapshot of one session
    pub async fn session(&self, key: &SessionKey) -> Result<SessionInfo> {
        let entry = self.entry(key).await?;
        let info = entry.lock().await.info();
        Ok(info)
    }

    /// Snapshots of every recorded session, ordered by key
    pub async fn list(&self) -> Vec<SessionInfo> {
        let entries: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut list = Vec::with_capacity(entries.len());
        for entry in entries {
            list.push(entry.lock().await.info());
        }
        list.sort_by(|a, b| a.key.cmp(&b.key));
        list
    }

    /// Drop terminated records; returns how many were removed
    pub async fn reap(&self) -> usize {
        let entries: Vec<_> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();

        // a busy entry is mid-operation; it is picked up by a later reap
        let dead: Vec<_> = entries
            .into_iter()
            .filter(|(_, entry)| {
                entry
                    .try_lock()
                    .map(|e| e.status.is_terminated())
                    .unwrap_or(false)
            })
            .collect();

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for (key, entry) in &dead {
            // skip keys re-spawned since the snapshot
            if sessions.get(key).is_some_and(|current| Arc::ptr_eq(current, entry)) {
                sessions.remove(key);
                removed += 1;
            }
        }
        drop(sessions);

        if removed > 0 {
            debug!(count = removed, "Reaped terminated sessions");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::LaunchedSession;
    use crate::signal::UnsupportedSignaler;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory session: output is pre-seeded, the group "dies" on demand
    struct FakeLauncher {
        banner: &'static [u8],
        alive: Arc<AtomicBool>,
        launches: AtomicUsize,
        outputs: parking_lot::Mutex<Vec<OutputBuffer>>,
    }

    impl FakeLauncher {
        fn new(banner: &'static [u8]) -> Self {
            Self {
                banner,
                alive: Arc::new(AtomicBool::new(true)),
                launches: AtomicUsize::new(0),
                outputs: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    struct FakeProcess(Arc<AtomicBool>);

    impl SessionProcess for FakeProcess {
        fn has_exited(&mut self) -> bool {
            !self.0.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionLauncher for FakeLauncher {
        async fn launch(&self, _spec: &LaunchSpec) -> Result<LaunchedSession> {
            let n = self.launches.fetch_add(1, Ordering::SeqCst);
            self.alive.store(true, Ordering::SeqCst);
            let output = OutputBuffer::new(100);
            output.push_bytes(self.banner);
            self.outputs.lock().push(output.clone());
            Ok(LaunchedSession {
                process_group_id: 1000 + n as i32,
                output,
                input: Box::new(Vec::new()),
                process: Box::new(FakeProcess(self.alive.clone())),
            })
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    /// Records signals by group; the group dies on SIGTERM unless `stubborn`
    struct RecordingSignaler {
        alive: Arc<AtomicBool>,
        stubborn: bool,
        sent: parking_lot::Mutex<Vec<(i32, Signal)>>,
        probed: parking_lot::Mutex<Vec<i32>>,
    }

    impl RecordingSignaler {
        fn signals(&self) -> Vec<Signal> {
            self.sent.lock().iter().map(|(_, signal)| *signal).collect()
        }
    }

    impl GroupSignaler for RecordingSignaler {
        fn signal_group(&self, pgid: i32, signal: Signal) -> SignalOutcome {
            if signal == Signal::Probe {
                self.probed.lock().push(pgid);
            } else {
                self.sent.lock().push((pgid, signal));
            }
            match signal {
                Signal::Probe if self.alive.load(Ordering::SeqCst) => SignalOutcome::Delivered,
                Signal::Probe => SignalOutcome::NoSuchGroup,
                Signal::Terminate if !self.stubborn => {
                    self.alive.store(false, Ordering::SeqCst);
                    SignalOutcome::Delivered
                }
                Signal::Terminate => SignalOutcome::Delivered,
                Signal::Kill => {
                    self.alive.store(false, Ordering::SeqCst);
                    SignalOutcome::Delivered
                }
            }
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn config() -> SessionControllerConfig {
        SessionControllerConfig::default().with_poll_interval(Duration::from_millis(10))
    }

    fn parts(
        banner: &'static [u8],
        stubborn: bool,
    ) -> (SessionController, Arc<FakeLauncher>, Arc<RecordingSignaler>) {
        let launcher = Arc::new(FakeLauncher::new(banner));
        let signaler = Arc::new(RecordingSignaler {
            alive: launcher.alive.clone(),
            stubborn,
            sent: parking_lot::Mutex::new(Vec::new()),
            probed: parking_lot::Mutex::new(Vec::new()),
        });
        let controller = SessionController::with_parts(config(), launcher.clone(), signaler.clone());
        (controller, launcher, signaler)
    }

    fn controller(banner: &'static [u8], stubborn: bool) -> (SessionController, Arc<RecordingSignaler>) {
        let (controller, _, signaler) = parts(banner, stubborn);
        (controller, signaler)
    }

    fn key() -> SessionKey {
        SessionKey::new("test-rig", "Toast")
    }

    #[tokio::test]
    async fn test_spawn_records_session() {
        let (controller, _) = controller(b"", false);
        let info = controller.spawn(&key()).await.unwrap();

        assert_eq!(info.session_name, "gt-test-rig-Toast");
        assert_eq!(info.status, SessionStatus::Spawning);
        assert_eq!(info.process_group_id, 1000);
        assert_eq!(info.command, "claude");
        assert_eq!(controller.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_twice_fails() {
        let (controller, _) = controller(b"", false);
        controller.spawn(&key()).await.unwrap();
        let err = controller.spawn(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_respawn_after_terminate() {
        let (controller, _) = controller(b"", false);
        controller.spawn(&key()).await.unwrap();
        controller.terminate(&key(), Duration::from_millis(50)).await.unwrap();

        let info = controller.spawn(&key()).await.unwrap();
        assert_eq!(info.status, SessionStatus::Spawning);
        assert_eq!(info.process_group_id, 1001);
    }

    #[tokio::test]
    async fn test_wait_ready_sees_marker() {
        let (controller, _) = controller(b"Welcome\r\n> ", false);
        controller.spawn(&key()).await.unwrap();

        let outcome = controller.wait_ready(&key(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, ReadyOutcome::Ready);
        assert_eq!(controller.status(&key()).await.unwrap(), SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_wait_ready_times_out() {
        let (controller, _) = controller(b"still loading", false);
        controller.spawn(&key()).await.unwrap();

        let started = Instant::now();
        let outcome = controller.wait_ready(&key(), Duration::from_millis(50)).await.unwrap();
        assert_eq!(outcome, ReadyOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(controller.status(&key()).await.unwrap(), SessionStatus::Spawning);
    }

    #[tokio::test]
    async fn test_wait_ready_sees_marker_printed_before_exit() {
        let (controller, launcher, _) = parts(b"", false);
        controller.spawn(&key()).await.unwrap();

        // leader is gone, the reader has not delivered its last chunk yet
        launcher.alive.store(false, Ordering::SeqCst);
        let output = launcher.outputs.lock()[0].clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            output.push_bytes(b"done\r\n> ");
            output.close();
        });

        let outcome = controller.wait_ready(&key(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, ReadyOutcome::Ready);
    }

    #[tokio::test]
    async fn test_wait_ready_gives_up_once_exited_and_drained() {
        let (controller, launcher, _) = parts(b"crashed\n", false);
        controller.spawn(&key()).await.unwrap();
        launcher.alive.store(false, Ordering::SeqCst);
        launcher.outputs.lock()[0].close();

        let started = Instant::now();
        let outcome = controller.wait_ready(&key(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, ReadyOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_terminate_graceful() {
        let (controller, signaler) = controller(b"", false);
        let info = controller.spawn(&key()).await.unwrap();

        let outcome = controller.terminate(&key(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, TerminateOutcome::Terminated);
        assert_eq!(*signaler.sent.lock(), vec![(info.process_group_id, Signal::Terminate)]);
        assert_eq!(controller.status(&key()).await.unwrap(), SessionStatus::Terminated);
        assert!(!controller.is_alive(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_terminate_escalates() {
        let (controller, signaler) = controller(b"", true);
        let info = controller.spawn(&key()).await.unwrap();

        let outcome = controller.terminate(&key(), Duration::from_millis(50)).await.unwrap();
        assert_eq!(outcome, TerminateOutcome::ForceTerminated);
        assert_eq!(signaler.signals(), vec![Signal::Terminate, Signal::Kill]);

        // every signal and probe targets the group, never another id
        let pgid = info.process_group_id;
        assert!(signaler.sent.lock().iter().all(|(id, _)| *id == pgid));
        assert!(!signaler.probed.lock().is_empty());
        assert!(signaler.probed.lock().iter().all(|id| *id == pgid));
        assert_eq!(controller.status(&key()).await.unwrap(), SessionStatus::Terminated);
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let (controller, signaler) = controller(b"", false);
        controller.spawn(&key()).await.unwrap();
        controller.terminate(&key(), Duration::from_secs(1)).await.unwrap();

        let outcome = controller.terminate(&key(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, TerminateOutcome::Terminated);
        assert_eq!(signaler.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let controller = SessionController::with_parts(
            config(),
            Arc::new(FakeLauncher::new(b"")),
            Arc::new(UnsupportedSignaler),
        );
        controller.spawn(&key()).await.unwrap();

        let outcome = controller.terminate(&key(), Duration::from_millis(50)).await.unwrap();
        assert_eq!(outcome, TerminateOutcome::Unsupported);
        assert!(!outcome.is_success());
        assert_ne!(controller.status(&key()).await.unwrap(), SessionStatus::Terminated);
    }

    #[tokio::test]
    async fn test_set_status_follows_table() {
        let (controller, _) = controller(b"> ", false);
        controller.spawn(&key()).await.unwrap();

        assert!(matches!(
            controller.set_status(&key(), SessionStatus::Working).await,
            Err(SessionError::InvalidTransition { .. })
        ));

        controller.wait_ready(&key(), Duration::from_secs(1)).await.unwrap();
        controller.set_status(&key(), SessionStatus::Working).await.unwrap();
        controller.set_status(&key(), SessionStatus::Idle).await.unwrap();
        controller.set_status(&key(), SessionStatus::PendingShutdown).await.unwrap();

        // terminated only through terminate()
        assert!(controller.set_status(&key(), SessionStatus::Terminated).await.is_err());
        assert_eq!(controller.status(&key()).await.unwrap(), SessionStatus::PendingShutdown);
    }

    #[tokio::test]
    async fn test_nudge_and_capture() {
        let (controller, _) = controller(b"line one\nline two\n> ", false);
        controller.spawn(&key()).await.unwrap();

        controller.nudge(&key(), "Begin.").await.unwrap();
        assert_eq!(controller.capture(&key(), 2).await.unwrap(), vec!["line two", "> "]);

        controller.terminate(&key(), Duration::from_secs(1)).await.unwrap();
        assert!(matches!(
            controller.nudge(&key(), "Begin.").await,
            Err(SessionError::NotRunning(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (controller, _) = controller(b"", false);
        let ghost = SessionKey::new("test-rig", "Ghost");
        assert!(controller.status(&ghost).await.unwrap_err().is_not_found());
        assert!(controller.terminate(&ghost, Duration::ZERO).await.unwrap_err().is_not_found());
        assert!(controller.wait_ready(&ghost, Duration::ZERO).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_reap() {
        let (controller, _) = controller(b"", false);
        let nux = SessionKey::new("test-rig", "Nux");
        controller.spawn(&key()).await.unwrap();
        controller.spawn(&nux).await.unwrap();
        controller.terminate(&key(), Duration::from_secs(1)).await.unwrap();

        assert_eq!(controller.reap().await, 1);
        let names: Vec<String> = controller.list().await.into_iter().map(|s| s.session_name).collect();
        assert_eq!(names, vec!["gt-test-rig-Nux"]);
    }

    #[tokio::test]
    async fn test_terminate_does_not_stall_other_sessions() {
        let (controller, signaler) = controller(b"> ", true);
        let controller = Arc::new(controller);
        let nux = SessionKey::new("test-rig", "Nux");
        controller.spawn(&key()).await.unwrap();
        controller.spawn(&nux).await.unwrap();

        let teardown = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.terminate(&key(), Duration::from_secs(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let reaper = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.reap().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        assert_eq!(controller.status(&nux).await.unwrap(), SessionStatus::Spawning);
        assert_eq!(controller.capture(&nux, 1).await.unwrap(), vec!["> "]);
        assert_eq!(controller.list().await.len(), 2);
        assert_eq!(controller.status(&key()).await.unwrap(), SessionStatus::Spawning);
        assert!(matches!(
            controller.spawn(&key()).await,
            Err(SessionError::AlreadyExists(_))
        ));
        assert!(started.elapsed() < Duration::from_millis(200));

        assert_eq!(reaper.await.unwrap(), 0);
        let outcome = teardown.await.unwrap().unwrap();
        assert_eq!(outcome, TerminateOutcome::ForceTerminated);
        assert_eq!(signaler.signals(), vec![Signal::Terminate, Signal::Kill]);
        assert_eq!(controller.reap().await, 1);
    }
}
