//! The index command: inspect and manage the near-duplicate hash index.

use clap::{Args, Subcommand};

use harvest_core::{Config, Deduplicator};

/// Arguments for the index command.
#[derive(Args, Debug)]
pub struct IndexArgs {
    #[command(subcommand)]
    command: IndexCommands,
}

#[derive(Subcommand, Debug)]
enum IndexCommands {
    /// Show index statistics (totals, per-source, bucket occupancy)
    Stats,

    /// Remove one image's fingerprints from the index
    Remove {
        /// Image id (as found in the manifest)
        image_id: String,
    },

    /// Reset the index entirely and persist the empty state
    Clear {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

/// Run an index subcommand.
pub fn run(args: IndexArgs, config: Config) -> anyhow::Result<()> {
    let dedup = Deduplicator::open(config.hash_index_path(), config.dedup.clone());

    match args.command {
        IndexCommands::Stats => {
            println!("{}", serde_json::to_string_pretty(&dedup.stats())?);
        }
        IndexCommands::Remove { image_id } => {
            dedup.remove(&image_id)?;
            tracing::info!("Removed {image_id} from the hash index");
        }
        IndexCommands::Clear { yes } => {
            anyhow::ensure!(yes, "refusing to clear the hash index without --yes");
            let count = dedup.len();
            dedup.clear()?;
            tracing::info!("Cleared {count} hash records");
        }
    }

    Ok(())
}
