//! rigswarm CLI - Main entry point

mod plan;
mod probe;

use clap::{Parser, Subcommand};
use rigswarm_foundation::RigswarmConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// rigswarm - orchestrate swarms of worker agents against a rig
#[derive(Parser, Debug)]
#[command(name = "rigswarm")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dry-run an epic: schedule its tasks wave by wave without sessions
    Plan {
        /// Epic file (JSON)
        epic: PathBuf,

        /// Rig name (defaults to the current directory name)
        #[arg(long)]
        rig: Option<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Spawn one worker session, wait for its prompt, then tear it down
    Probe {
        /// Worker command (defaults to the configured one)
        #[arg(short, long)]
        command: Option<String>,

        /// Seconds to wait for the ready marker
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output lines to show
        #[arg(short, long, default_value = "20")]
        lines: usize,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = RigswarmConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        RigswarmConfig::default()
    });

    // Initialize logging: RUST_LOG, then --debug, then config
    let log_level = if args.debug { "debug" } else { config.log_level.as_str() };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match args.command {
        Command::Plan { epic, rig, json } => {
            let rig = rig.unwrap_or_else(current_dir_name);
            plan::run(&epic, &rig, json)
        }
        Command::Probe {
            command,
            timeout,
            lines,
        } => {
            let rig = current_dir_name();
            probe::run(&config, &rig, command, timeout, lines).await
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn current_dir_name() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "rig".to_string())
}
