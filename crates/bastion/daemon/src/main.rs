//! Bastion daemon
//!
//! Watches component health, steps components down the degradation ladder
//! and back, and isolates tenants behind per-resource bulkheads.

use anyhow::Context;
use bastion_daemon::{Collaborators, GuardConfig, GuardContext};
use bastion_observability::{init_tracing, TracingConfig};
use clap::Parser;

/// Bastion daemon CLI
#[derive(Parser)]
#[command(name = "bastiond")]
#[command(about = "Bastion - component degradation and tenant bulkhead guard", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BASTION_CONFIG")]
    config: Option<String>,

    /// Log level, overriding the configuration file
    #[arg(long, env = "BASTION_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "BASTION_LOG_JSON")]
    json: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = GuardConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    if cli.check {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_tracing(
        &TracingConfig::new("bastiond")
            .with_log_level(log_level)
            .with_json_format(cli.json || config.logging.json),
    )?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting bastiond");

    let guard = GuardContext::start(config, Collaborators::new())
        .await
        .context("failed to start guard")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    guard.shutdown().await;
    Ok(())
}
