//! Harvest CLI - listing-photo harvester with cross-source near-duplicate
//! detection.
//!
//! Harvest takes an extraction plan (properties plus candidate photo URLs
//! per source), downloads and standardizes the images, and skips
//! near-duplicates across sources. Runs are resumable: interrupted
//! extractions pick up where they left off.
//!
//! # Usage
//!
//! ```bash
//! # Extract everything in a plan
//! harvest extract plan.json --output-dir ./photos
//!
//! # Inspect the near-duplicate index
//! harvest index stats
//!
//! # View configuration
//! harvest config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Harvest - listing-photo extraction with near-duplicate detection.
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use a specific config file instead of the default location
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract photos for the properties in a plan file
    Extract(cli::extract::ExtractArgs),

    /// Inspect and manage the near-duplicate hash index
    Index(cli::index::IndexArgs),

    /// View configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicitly named config file must load; the default location may
    // be absent or broken, in which case defaults apply with a warning.
    // Logging isn't initialized yet, so warnings go through eprintln.
    let config = match &cli.config {
        Some(path) => harvest_core::Config::load_from(path)
            .map_err(|e| anyhow::anyhow!("Cannot load config {path:?}: {e}"))?,
        None => match harvest_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `harvest config path`."
                );
                harvest_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("harvest v{}", harvest_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Extract(args) => cli::extract::run(args, config).await,
        Commands::Index(args) => cli::index::run(args, config),
        Commands::Config(args) => cli::config::run(args, config),
    }
}
