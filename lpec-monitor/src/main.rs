use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lpec_monitor::{DeviceDirectory, Orchestrator, Scenario};
use lpec_session::SessionConfig;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Real-time LPEC event monitor for Linn DS/DSM devices.
#[derive(Debug, Parser)]
#[command(name = "lpec-monitor", version, about)]
struct Args {
    /// Device directory file (dotenv format)
    #[arg(long, default_value = ".env")]
    env: PathBuf,

    /// Test scenario to assert against the event stream (JSON)
    #[arg(long, visible_alias = "test")]
    scenario: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Log heartbeat reads and no-change events
    #[arg(long)]
    verbose: bool,

    /// LPEC TCP port
    #[arg(long, default_value_t = 23)]
    port: u16,

    /// Service path to subscribe to
    #[arg(long, default_value = "Ds/Receiver")]
    service: String,

    /// Seconds to wait for sessions to close on shutdown
    #[arg(long, default_value_t = 5)]
    grace_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let directory = DeviceDirectory::load(&args.env)
        .with_context(|| format!("loading device directory {}", args.env.display()))?;
    info!(devices = directory.len(), "device directory loaded");

    let config = SessionConfig::new()
        .with_port(args.port)
        .with_service_path(&args.service)
        .with_heartbeat_logging(args.verbose);

    let mut orchestrator = Orchestrator::new(directory, config)
        .with_grace_period(Duration::from_secs(args.grace_seconds));

    if let Some(path) = &args.scenario {
        let scenario = Scenario::load(path)
            .with_context(|| format!("loading scenario {}", path.display()))?;
        info!(scenario = %scenario.name, "running test scenario");
        if let Some(description) = &scenario.description {
            info!("{description}");
        }
        orchestrator = orchestrator.with_scenario(scenario);
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = cancel_tx.send(true);
            }
            Err(error) => {
                warn!(%error, "failed to install Ctrl-C handler");
                // Keep the sender alive so the run is not cancelled spuriously
                std::future::pending::<()>().await;
            }
        }
    });

    let outcome = orchestrator.run(cancel_rx).await?;
    if outcome.cancelled {
        info!(events = outcome.events_observed, "monitor interrupted");
    } else {
        info!(events = outcome.events_observed, "monitor finished");
    }
    std::process::exit(outcome.exit_code());
}
