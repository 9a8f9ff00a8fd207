//! rigswarm probe command
//!
//! Checks that worker sessions work on this machine: spawn, wait for the
//! prompt, show what the session printed, then tear the group down.

use rigswarm_foundation::RigswarmConfig;
use rigswarm_session::{
    ReadyOutcome, SessionController, SessionControllerConfig, SessionKey, TerminateOutcome,
};
use std::time::Duration;
use tracing::{debug, info};

pub async fn run(
    config: &RigswarmConfig,
    rig: &str,
    command: Option<String>,
    timeout_secs: Option<u64>,
    lines: usize,
) -> anyhow::Result<()> {
    let mut settings = config.session.clone();
    if let Some(command) = command {
        settings.command = command;
    }
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.ready_timeout());

    let controller = SessionController::new(SessionControllerConfig::from(&settings));
    let key = SessionKey::new(rig, "probe");

    let info = controller.spawn(&key).await?;
    info!(session = %info.session_name, pgid = info.process_group_id, "Probe session spawned");
    println!(
        "Spawned {} (pgid {}): {}",
        info.session_name, info.process_group_id, info.command
    );

    let ready = controller.wait_ready(&key, timeout).await?;
    match ready {
        ReadyOutcome::Ready => println!("✓ Ready marker {:?} seen", settings.ready_marker),
        ReadyOutcome::TimedOut => println!(
            "✗ No ready marker {:?} within {}s",
            settings.ready_marker,
            timeout.as_secs()
        ),
    }

    debug!(session = %info.session_name, ?ready, "Readiness checked");

    let tail = controller.capture(&key, lines).await?;
    println!("\n--- last {} lines ---", tail.len());
    for line in &tail {
        println!("{}", line);
    }
    println!("---\n");

    let outcome = controller.terminate(&key, settings.grace_period()).await?;
    debug!(session = %info.session_name, ?outcome, "Probe session torn down");
    match &outcome {
        TerminateOutcome::Terminated => println!("✓ Terminated"),
        TerminateOutcome::ForceTerminated => println!("✓ Terminated (SIGKILL after grace period)"),
        TerminateOutcome::Failed(reason) => println!("✗ Teardown failed: {}", reason),
        TerminateOutcome::Unsupported => {
            println!("✗ Process-group teardown is not supported on this platform")
        }
    }

    if ready != ReadyOutcome::Ready || !outcome.is_success() {
        anyhow::bail!("probe failed");
    }
    Ok(())
}
