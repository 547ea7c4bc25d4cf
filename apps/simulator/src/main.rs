use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fleet::Fleet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod publish;

use config::{load_settings, Overrides, Settings};
use publish::{run_publisher, LogSink};

#[derive(Parser, Debug)]
#[command(name = "drift-simulator")]
#[command(about = "Simulated sensor devices whose readings drift toward changing targets")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Broker address records are published to (e.g. 192.168.0.101:1883)
    #[arg(short, long, global = true)]
    broker: Option<String>,

    /// Number of collectors to create
    #[arg(short = 'r', long, global = true)]
    collectors: Option<usize>,

    /// Device count per collector, repeated in collector order (-a 1 -a 2)
    #[arg(short = 'a', long = "devices", global = true)]
    devices: Vec<usize>,

    /// Publish interval in seconds
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts the simulator
    Start,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    settings.apply_overrides(Overrides {
        broker_address: cli.broker,
        collectors: cli.collectors,
        devices_per_collector: cli.devices,
        publish_interval_secs: cli.interval,
    });

    match cli.command {
        Command::Start => run(settings).await,
    }
}

async fn run(settings: Settings) -> Result<()> {
    info!(
        broker = %settings.broker_address,
        collectors = settings.collectors,
        devices_per_collector = ?settings.devices_per_collector,
        publish_interval_secs = settings.publish_interval_secs,
        "simulator: starting"
    );

    let fleet = Fleet::build(&settings.fleet_plan(), settings.drift).await?;
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let sink = LogSink::new(settings.broker_address.clone());
    run_publisher(&fleet, &sink, settings.publish_interval(), shutdown).await;

    fleet.shutdown().await;
    info!("simulator: shutdown complete");
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = ctrl_c => {
            if let Err(error) = result {
                error!(%error, "failed to listen for SIGINT");
                return;
            }
            info!("SIGINT received, shutting down");
        }
        _ = terminate => {
            info!("SIGTERM received, shutting down");
        }
    }

    shutdown.cancel();
}
