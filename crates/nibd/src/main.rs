//! nibd entry point.
//!
//! Replays controller events from stdin through the application and prints
//! each installed policy to stdout as one JSON line.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use nibd::replay::{read_events, ReplayController};
use nibd::{App, NibdConfig};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

/// Reactive SDN controller application
#[derive(Parser, Debug)]
#[command(name = "nibd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = nibd::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Event channel capacity
    #[arg(long, default_value = "1024")]
    queue_depth: usize,
}

fn init_logging(log_level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the policy stream
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .pretty(),
            )
            .init(),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = NibdConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let services = config
        .load_services()
        .context("loading load balancer services")?;

    info!("Client id: {}", config.controller.client_id);
    info!("Install delay: {:?}", config.install_delay());
    info!("Services: {}", services.services.len());

    let controller = ReplayController::new(config.topology.to_switch_ports(), io::stdout());
    let mut app = App::from_config(&config, &services, controller)?;

    let (tx, rx) = mpsc::channel(args.queue_depth);
    let reader = tokio::spawn(read_events(BufReader::new(tokio::io::stdin()), tx));

    tokio::select! {
        result = app.run(rx) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl-C, shutting down");
            app.log_stats();
        }
    }

    reader.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_format);

    info!("Starting nibd");

    match run(args).await {
        Ok(()) => {
            info!("nibd stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("nibd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
