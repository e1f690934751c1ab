//! ---
//! ha_section: "05-cli"
//! ha_subsection: "binary"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Binary entrypoint for the HA supervisor."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sol_ha_common::config::Config;
use sol_ha_common::logging::init_tracing;
use sol_ha_common::StateCache;
use sol_ha_core::{ControllerOptions, FailoverController};
use sol_ha_metrics::{spawn_surface, HaMetrics};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "solana-validator-ha",
    version,
    about = "High availability manager for Solana validators",
    long_about = "Monitors cluster gossip and manages failover decisions so that \
exactly one validator of the configured peer group runs the active identity."
)]
struct Cli {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        default_value = "~/solana-validator-ha/config.yaml",
        help = "Path to configuration file"
    )]
    config: PathBuf,

    #[arg(
        short = 'l',
        long,
        value_enum,
        default_value_t = LogLevel::Info,
        help = "Log level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Directive for the tracing filter; `fatal` has no tracing
    /// equivalent and maps to `error`.
    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Start the supervisor and block until a termination signal")]
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.directive());

    let result = match cli.command {
        Commands::Run => run(&cli.config).await,
    };
    if let Err(err) = result {
        error!(error = ?err, "fatal error");
        std::process::exit(1);
    }
}

async fn run(config_path: &PathBuf) -> Result<()> {
    let loaded = Config::load(config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    let config = Arc::new(loaded.config);
    let identities = Arc::new(loaded.identities);
    info!(
        validator = %config.validator.name,
        cluster = %config.cluster.name,
        active_pubkey = %identities.active.pubkey(),
        passive_pubkey = %identities.passive.pubkey(),
        "configuration loaded"
    );

    let cache = Arc::new(StateCache::new());

    let metrics = HaMetrics::new(&config.prometheus.static_labels)
        .context("failed to build metrics registry")?;
    let surface = spawn_surface(cache.clone(), metrics, config.prometheus.port)
        .await
        .context("failed to start metrics surface")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller = FailoverController::new(ControllerOptions {
        config: config.clone(),
        identities,
        cache,
        shutdown: shutdown_rx,
        public_ip: None,
    })
    .await
    .context("failed to initialise failover controller")?;
    let controller_task = tokio::spawn(controller.run());

    info!("supervisor running; waiting for termination signal");
    signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("termination signal received; shutting down");

    // The controller finishes its current tick; running commands are never
    // cut off.
    let _ = shutdown_tx.send(true);
    controller_task
        .await
        .context("controller task panicked")??;
    surface.shutdown().await?;

    Ok(())
}
