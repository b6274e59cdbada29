//! Arcana CLI - structured tarot readings from language models
use std::io::stderr;

use anyhow::Result;
use arcana_cli::handlers::{handle_catalog, handle_config, handle_reading, load_config};
use arcana_cli::{Cli, Commands};
use clap::Parser as _;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> Result<()> {
    Registry::default()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arcana_routing=info,arcana_providers=info".into()),
        )
        .with(fmt::layer().with_writer(stderr).with_target(true))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Reading(args) => handle_reading(&config, args).await?,
        Commands::Config { path } => handle_config(&config, cli.config.as_deref(), path)?,
        Commands::Catalog { tier, all } => handle_catalog(&config, tier, all)?,
    }

    Ok(())
}
