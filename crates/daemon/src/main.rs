//! DiskNav Daemon
//!
//! Chat bot serving a remote folder tree as navigable menus.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use daemon::config::{default_config_path, Config};
use daemon::orchestrator::{Orchestrator, OrchestratorEvent};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix for rolling log files.
const LOG_FILE_NAME: &str = "disknav.log";

/// DiskNav Daemon - chat bot serving a remote folder tree as navigable menus.
#[derive(Parser, Debug)]
#[command(name = "disknav")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start polling and serving interactions
    Start,

    /// Print the effective configuration as TOML
    PrintConfig,

    /// Validate the configuration and credentials, then exit
    CheckConfig,

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    if let Commands::InitConfig { force } = cli.command {
        return init_config(&config_path, force);
    }

    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();
    config.validate()?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.daemon.log_level.as_str()
    };
    let _guard = init_tracing(level, config.daemon.log_dir.as_deref());

    tracing::debug!("Using config file: {:?}", config_path);

    match cli.command {
        Commands::Start => run(&config).await,
        Commands::PrintConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::CheckConfig => {
            config.require_credentials()?;
            println!("Configuration OK: {}", config_path.display());
            Ok(())
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

/// Install the console subscriber and, when a log directory is configured,
/// a daily rolling file writer. The returned guard must outlive the program.
fn init_tracing(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Write the default configuration to `path`.
fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Run the bot until SIGINT or SIGTERM.
async fn run(config: &Config) -> anyhow::Result<()> {
    config.require_credentials()?;

    tracing::info!("DiskNav daemon starting...");

    let orchestrator = Orchestrator::from_config(config)?;
    let mut events = orchestrator.subscribe();

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                OrchestratorEvent::StateChanged(state) => {
                    tracing::info!("Orchestrator state: {:?}", state);
                }
                OrchestratorEvent::Polled { count } => {
                    tracing::trace!("Received {} interaction(s)", count);
                }
                OrchestratorEvent::PollFailed { message } => {
                    tracing::warn!("Polling failed: {}", message);
                }
            }
        }
    });

    orchestrator.start().await?;

    wait_for_shutdown_signal().await?;
    tracing::info!("Received shutdown signal");

    orchestrator.stop().await?;
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
