//! finproof command-line entry point

use anyhow::Context;
use clap::Parser;
use finproof_cli::{App, Cli, StoreMode, commands};
use finproof_market::MarketConfig;
use finproof_utils::{AppConfig, init_tracing_with};
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::from_env()?,
    };
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    let filter = if cli.verbose { "debug" } else { "warn" };
    init_tracing_with(config.log_format, filter)?;
    debug!(?config, "Configuration loaded");

    let mode = if cli.in_memory {
        StoreMode::Memory
    } else {
        StoreMode::File
    };
    let market = MarketConfig::from_env();
    let app = App::open(config, market, mode).await?;

    commands::run(&app, cli.command, cli.json).await
}
