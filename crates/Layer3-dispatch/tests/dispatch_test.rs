//! Dispatcher scenarios against an in-memory launcher and signaler

use async_trait::async_trait;
use parking_lot::Mutex;
use rigswarm_dispatch::{Dispatcher, SpawnOutcome};
use rigswarm_session::{
    GroupSignaler, LaunchSpec, LaunchedSession, OutputBuffer, ReadyOutcome, SessionController,
    SessionControllerConfig, SessionKey, SessionLauncher, SessionProcess, SessionStatus, Signal,
    SignalOutcome, TerminateOutcome,
};
use rigswarm_swarm::{Rig, SwarmManager, SwarmState, TaskRecord, TaskState};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Sessions that print the prompt at once and record their input
#[derive(Default)]
struct FakeLauncher {
    next_pgid: Mutex<i32>,
    live: Arc<Mutex<HashSet<i32>>>,
    inputs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_for: Option<String>,
    broken_input: Option<String>,
}

struct FakeProcess {
    pgid: i32,
    live: Arc<Mutex<HashSet<i32>>>,
}

impl SessionProcess for FakeProcess {
    fn has_exited(&mut self) -> bool {
        !self.live.lock().contains(&self.pgid)
    }
}

/// Writer that appends into the shared input map
struct RecordingInput {
    session: String,
    inputs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    broken: bool,
}

impl Write for RecordingInput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.broken {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "terminal closed"));
        }
        self.inputs
            .lock()
            .entry(self.session.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> rigswarm_session::Result<LaunchedSession> {
        if self.fail_for.as_deref() == Some(spec.session_name.as_str()) {
            return Err(rigswarm_session::SessionError::Spawn("no such binary".to_string()));
        }

        let pgid = {
            let mut next = self.next_pgid.lock();
            *next += 1;
            1000 + *next
        };
        self.live.lock().insert(pgid);

        let output = OutputBuffer::new(50);
        output.push_bytes(b"> ");
        Ok(LaunchedSession {
            process_group_id: pgid,
            output,
            input: Box::new(RecordingInput {
                session: spec.session_name.clone(),
                inputs: self.inputs.clone(),
                broken: self.broken_input.as_deref() == Some(spec.session_name.as_str()),
            }),
            process: Box::new(FakeProcess {
                pgid,
                live: self.live.clone(),
            }),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// SIGTERM ends the group at once
struct FakeSignaler {
    live: Arc<Mutex<HashSet<i32>>>,
}

impl GroupSignaler for FakeSignaler {
    fn signal_group(&self, pgid: i32, signal: Signal) -> SignalOutcome {
        let mut live = self.live.lock();
        if !live.contains(&pgid) {
            return SignalOutcome::NoSuchGroup;
        }
        if signal != Signal::Probe {
            live.remove(&pgid);
        }
        SignalOutcome::Delivered
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct Harness {
    dispatcher: Dispatcher,
    live: Arc<Mutex<HashSet<i32>>>,
    inputs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

fn harness_with(launcher: FakeLauncher) -> Harness {
    let live = launcher.live.clone();
    let inputs = launcher.inputs.clone();
    let signaler = Arc::new(FakeSignaler { live: live.clone() });
    let config = SessionControllerConfig::default().with_poll_interval(Duration::from_millis(10));
    let sessions = Arc::new(SessionController::with_parts(config, Arc::new(launcher), signaler));
    let manager = SwarmManager::new(Rig::new("gastown", "/tmp/gastown"));

    Harness {
        dispatcher: Dispatcher::new(manager, sessions),
        live,
        inputs,
    }
}

fn harness() -> Harness {
    harness_with(FakeLauncher::default())
}

fn epic(manager: &SwarmManager, workers: &[&str], tasks: Vec<TaskRecord>) {
    let workers = workers.iter().map(|w| w.to_string()).collect();
    manager.create("epic-1", workers, "main").unwrap();
    manager.load_tasks("epic-1", tasks).unwrap();
}

const GRACE: Duration = Duration::from_millis(100);

#[tokio::test]
async fn inactive_swarm_dispatches_nothing() {
    let h = harness();
    let manager = h.dispatcher.manager();
    epic(manager, &["Toast"], vec![TaskRecord::new("task-1", "")]);

    assert!(h.dispatcher.dispatch_ready("epic-1").await.unwrap().is_empty());
    assert!(h.dispatcher.sessions().list().await.is_empty());
    assert_eq!(
        manager.get_swarm("epic-1").unwrap().tasks[0].state,
        TaskState::Pending
    );
}

#[tokio::test]
async fn dispatch_is_bounded_by_idle_workers() {
    let h = harness();
    let manager = h.dispatcher.manager();
    epic(
        manager,
        &["Toast", "Nux"],
        vec![
            TaskRecord::new("task-1", ""),
            TaskRecord::new("task-2", ""),
            TaskRecord::new("task-3", ""),
        ],
    );
    manager.start("epic-1").unwrap();

    let assignments = h.dispatcher.dispatch_ready("epic-1").await.unwrap();
    let pairs: Vec<(&str, &str)> = assignments
        .iter()
        .map(|a| (a.issue_id.as_str(), a.worker.as_str()))
        .collect();
    assert_eq!(pairs, vec![("task-1", "Toast"), ("task-2", "Nux")]);
    assert!(assignments
        .iter()
        .all(|a| matches!(a.spawn, SpawnOutcome::Spawned(_))));

    // nobody idle: second tick is a no-op
    assert!(h.dispatcher.dispatch_ready("epic-1").await.unwrap().is_empty());
    assert_eq!(h.dispatcher.sessions().list().await.len(), 2);
}

#[tokio::test]
async fn spawn_failure_keeps_assignment() {
    let h = harness_with(FakeLauncher {
        fail_for: Some("gt-gastown-Toast".to_string()),
        ..FakeLauncher::default()
    });
    let manager = h.dispatcher.manager();
    epic(manager, &["Toast"], vec![TaskRecord::new("task-1", "")]);
    manager.start("epic-1").unwrap();

    let assignments = h.dispatcher.dispatch_ready("epic-1").await.unwrap();
    assert_eq!(assignments.len(), 1);
    assert!(matches!(assignments[0].spawn, SpawnOutcome::Failed(_)));

    let task = manager.get_swarm("epic-1").unwrap().tasks[0].clone();
    assert_eq!(task.state, TaskState::Assigned);
    assert_eq!(task.assignee, "Toast");
}

#[tokio::test]
async fn trigger_nudges_ready_sessions() {
    let h = harness();
    let manager = h.dispatcher.manager();
    epic(manager, &["Toast", "Nux"], vec![TaskRecord::new("task-1", "")]);
    manager.start("epic-1").unwrap();
    h.dispatcher.dispatch_ready("epic-1").await.unwrap();

    let triggers = h
        .dispatcher
        .trigger_ready("epic-1", Duration::from_secs(1))
        .await
        .unwrap();

    // only Toast got a task, so only Toast has a session
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].worker, "Toast");
    assert_eq!(triggers[0].outcome, ReadyOutcome::Ready);
    assert!(triggers[0].nudged);
    assert!(triggers[0].error.is_none());

    let input = h.inputs.lock().get("gt-gastown-Toast").cloned().unwrap();
    assert_eq!(input, b"Begin.\r".to_vec());

    let key = SessionKey::new("gastown", "Toast");
    assert_eq!(
        h.dispatcher.sessions().status(&key).await.unwrap(),
        SessionStatus::Working
    );

    // already working: not triggered twice
    assert!(h
        .dispatcher
        .trigger_ready("epic-1", Duration::from_secs(1))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn trigger_failure_does_not_drop_other_workers() {
    let h = harness_with(FakeLauncher {
        broken_input: Some("gt-gastown-Toast".to_string()),
        ..FakeLauncher::default()
    });
    let manager = h.dispatcher.manager();
    epic(
        manager,
        &["Toast", "Nux"],
        vec![TaskRecord::new("task-1", ""), TaskRecord::new("task-2", "")],
    );
    manager.start("epic-1").unwrap();
    h.dispatcher.dispatch_ready("epic-1").await.unwrap();

    let triggers = h
        .dispatcher
        .trigger_ready("epic-1", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(triggers.len(), 2);

    assert_eq!(triggers[0].worker, "Toast");
    assert_eq!(triggers[0].outcome, ReadyOutcome::Ready);
    assert!(!triggers[0].nudged);
    assert!(triggers[0].error.is_some());

    assert_eq!(triggers[1].worker, "Nux");
    assert!(triggers[1].nudged);
    assert!(triggers[1].error.is_none());
    assert_eq!(
        h.inputs.lock().get("gt-gastown-Nux").cloned().unwrap(),
        b"Begin.\r".to_vec()
    );

    let sessions = h.dispatcher.sessions();
    assert_eq!(
        sessions.status(&SessionKey::new("gastown", "Toast")).await.unwrap(),
        SessionStatus::Ready
    );
    assert_eq!(
        sessions.status(&SessionKey::new("gastown", "Nux")).await.unwrap(),
        SessionStatus::Working
    );
}

#[tokio::test]
async fn epic_runs_to_completion() {
    let h = harness();
    let manager = h.dispatcher.manager();
    epic(
        manager,
        &["Toast", "Nux"],
        vec![
            TaskRecord::new("task-1", ""),
            TaskRecord::new("task-2", "").depends_on("task-1"),
        ],
    );
    manager.start("epic-1").unwrap();

    let first = h.dispatcher.dispatch_ready("epic-1").await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].issue_id, "task-1");

    let done = h
        .dispatcher
        .complete_task("epic-1", "task-1", GRACE)
        .await
        .unwrap();
    assert!(!done.swarm_complete);
    assert_eq!(done.terminated, Some(TerminateOutcome::Terminated));

    // Toast's old session is terminated, so it can be spawned again
    let second = h.dispatcher.dispatch_ready("epic-1").await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].issue_id, "task-2");
    assert_eq!(second[0].worker, "Toast");
    assert!(matches!(second[0].spawn, SpawnOutcome::Spawned(_)));

    let done = h
        .dispatcher
        .complete_task("epic-1", "task-2", GRACE)
        .await
        .unwrap();
    assert!(done.swarm_complete);
    assert!(manager.is_complete("epic-1").unwrap());
    assert!(h.live.lock().is_empty());
}

#[tokio::test]
async fn shutdown_cancels_and_tears_down() {
    let h = harness();
    let manager = h.dispatcher.manager();
    epic(
        manager,
        &["Toast", "Nux", "Slit"],
        vec![TaskRecord::new("task-1", ""), TaskRecord::new("task-2", "")],
    );
    manager.start("epic-1").unwrap();
    h.dispatcher.dispatch_ready("epic-1").await.unwrap();

    let outcomes = h
        .dispatcher
        .shutdown("epic-1", "user requested", GRACE)
        .await
        .unwrap();

    // Slit never had a session
    let workers: Vec<&str> = outcomes.iter().map(|(w, _)| w.as_str()).collect();
    assert_eq!(workers, vec!["Toast", "Nux"]);
    assert!(outcomes.iter().all(|(_, o)| o.is_success()));
    assert!(h.live.lock().is_empty());

    let swarm = manager.get_swarm("epic-1").unwrap();
    assert_eq!(swarm.state, SwarmState::Cancelled);
    assert_eq!(swarm.error, "user requested");

    // cancelled swarms never dispatch again
    assert!(h.dispatcher.dispatch_ready("epic-1").await.unwrap().is_empty());
    assert!(h.dispatcher.shutdown("epic-1", "again", GRACE).await.is_err());
}
