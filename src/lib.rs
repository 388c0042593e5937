pub mod cli;
pub mod core;
pub mod ingest;
pub mod providers;
pub mod store;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::config::AppConfig;
use crate::ingest::IngestionService;
use crate::providers::ExchangeRateApiProvider;
use crate::store::{MemoryStore, PgGateway};

/// Commands runnable against a loaded configuration.
pub enum AppCommand {
    /// Fetch and print a quote without writing it.
    Fetch { pair: Option<String> },
    /// Fetch a quote and persist it. `dry_run` writes to memory instead.
    Ingest { pair: Option<String>, dry_run: bool },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("forex-ingest starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(database = ?config.database, "Loaded config");

    let fetcher = ExchangeRateApiProvider::new(
        &config.provider.base_url,
        &config.provider.api_key,
        config.provider.timeout(),
    )
    .context("Failed to build HTTP client")?;

    match command {
        AppCommand::Fetch { pair } => {
            let pair = pair.as_deref().unwrap_or(&config.default_pair);
            cli::fetch::run(&fetcher, pair).await
        }
        AppCommand::Ingest {
            pair,
            dry_run: true,
        } => {
            let pair = pair.as_deref().unwrap_or(&config.default_pair);
            let service = IngestionService::new(fetcher, MemoryStore::new());
            cli::ingest::run(&service, pair).await
        }
        AppCommand::Ingest {
            pair,
            dry_run: false,
        } => {
            let pair = pair.as_deref().unwrap_or(&config.default_pair);
            let gateway = PgGateway::connect(&config.database)
                .await
                .context("Cannot start ingestion without a database connection")?;
            let report = gateway.ensure_schema().await?;
            debug!(?report, database = gateway.database(), "Schema ready");

            let service = IngestionService::new(fetcher, gateway);
            let result = cli::ingest::run(&service, pair).await;
            service.into_store().close();
            result
        }
    }
}
