use anyhow::Result;
use clap::{Parser, Subcommand};
use forex_ingest::cli::setup::setup;
use forex_ingest::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch and display the current rate for a currency pair
    Fetch {
        /// Currency pair in BASE/QUOTE form, e.g. USD/GBP
        pair: Option<String>,
    },
    /// Fetch the current rate and store it in the database
    Ingest {
        /// Currency pair in BASE/QUOTE form, e.g. USD/GBP
        pair: Option<String>,

        /// Keep the record in memory instead of writing to the database
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Setup => setup(),
        Commands::Fetch { pair } => {
            forex_ingest::run_command(
                forex_ingest::AppCommand::Fetch { pair },
                cli.config_path.as_deref(),
            )
            .await
        }
        Commands::Ingest { pair, dry_run } => {
            forex_ingest::run_command(
                forex_ingest::AppCommand::Ingest { pair, dry_run },
                cli.config_path.as_deref(),
            )
            .await
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
