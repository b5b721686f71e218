//! # Drone Dashboard
//!
//! Connects to a MAVLink vehicle and shows its live telemetry in the
//! terminal until `q` is pressed or the process is signalled.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and load the optional TOML config
//!    - Start file logging (the terminal belongs to the dashboard)
//!
//! 2. **Startup**
//!    - Connect to the vehicle, waiting a bounded time for its heartbeat
//!    - Switch the terminal to the dashboard and start rendering
//!
//! 3. **Shutdown**
//!    - Triggered by Ctrl+C, SIGTERM or the quit key
//!    - Stop rendering, restore the terminal, then disconnect
//!
//! # Examples
//!
//! ```bash
//! drone-dashboard                       # listen on udp://:14540
//! drone-dashboard tcp://:5760
//! drone-dashboard serial:///dev/ttyACM0:57600 --config config/dashboard.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use drone_dashboard::config::{Config, LoggingConfig};
use drone_dashboard::dashboard::Dashboard;
use drone_dashboard::display::TerminalSurface;
use drone_dashboard::source::MavlinkSource;

/// Prefix of the daily log files
const LOG_FILE_PREFIX: &str = "drone-dashboard.log";

/// Live MAVLink telemetry dashboard for the terminal
#[derive(Debug, Parser)]
#[command(name = "drone-dashboard", version, about)]
struct Cli {
    /// Connection address: udp://:PORT, tcp://:PORT or serial:///dev/DEVICE[:BAUD]
    address: Option<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    /// The positional address wins over the configured one
    fn address<'a>(&'a self, config: &'a Config) -> &'a str {
        self.address.as_deref().unwrap_or(&config.connection.address)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let _log_guard = init_logging(&config.logging)?;

    let address = cli.address(&config).to_string();
    info!("Drone Dashboard v{} starting...", env!("CARGO_PKG_VERSION"));

    println!("Drone Telemetry Dashboard");
    println!("Connecting to: {}", address);

    let source = MavlinkSource::new(config.connection.clone());
    let mut dashboard = Dashboard::new(config, source, TerminalSurface::new());

    dashboard.start(&address).await?;
    dashboard.run_until(shutdown_signal()).await?;

    println!("Dashboard stopped");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Log to a daily-rolling file; `RUST_LOG` overrides the configured level
fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory {}", config.log_dir))?;

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
