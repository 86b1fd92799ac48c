//! Ariadne - local-first observability backend for agent telemetry
//!
//! Agent processes POST trace and span events to `/ingest`; viewers follow
//! the live stream on `/events`. Everything lives in memory for the lifetime
//! of the process.

use ariadne_core::config::{AriadneConfig, ConfigLoader};
use ariadne_web::{start_server, AppState};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "ariadne")]
#[command(version)]
#[command(about = "Local-first trace viewer backend for agent telemetry", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short, long, env = "ARIADNE_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (loopback recommended)
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Ring-buffer capacity
    #[arg(long)]
    max_events: Option<usize>,

    /// Allowed CORS origin for the viewer
    #[arg(long)]
    cors_origin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new()
        .with_cli_path(cli.config.clone())
        .load()?;
    apply_cli_overrides(&cli, &mut config);

    init_logging(&cli, &config);

    let state = AppState::from_config(&config);
    info!(
        "Starting Ariadne v{} (max_events {}, queue {})",
        env!("CARGO_PKG_VERSION"),
        config.store.max_events,
        config.stream.queue_capacity
    );

    start_server(&config, state).await
}

/// CLI flags win over env vars and config file
fn apply_cli_overrides(cli: &Cli, config: &mut AriadneConfig) {
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(max_events) = cli.max_events {
        config.store.max_events = max_events;
    }
    if let Some(origin) = &cli.cors_origin {
        config.cors.origin = origin.clone();
    }
}

fn init_logging(cli: &Cli, config: &AriadneConfig) {
    let level = match cli.verbose {
        0 => match config.server.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        },
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: logging already initialized");
    }
}
