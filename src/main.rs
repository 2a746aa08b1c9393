mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tiergraph::config::TiergraphConfig;

#[derive(Parser)]
#[command(name = "tiergraph", version, about = "Tiered similarity-linked vector/graph store")]
struct Cli {
    /// Config file (defaults to ~/.tiergraph/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bulk-import a bootstrap corpus JSON file into the hot tier
    Import {
        file: PathBuf,
        /// Override the configured item cap
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show hot- and cold-tier statistics
    Stats,
    /// Re-link the hot tier by batched top-K cosine similarity
    Ignite {
        #[arg(long)]
        k: Option<usize>,
    },
    /// Run the force-directed layout pass
    Layout,
    /// Form wormhole links in folded space
    Fold,
    /// Decay masses and prune sub-threshold nodes
    Metabolize,
    /// Migrate lowest-mass nodes to the cold tier if over capacity
    Tier {
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Bring nodes back from the cold tier
    Recall { ids: Vec<String> },
    /// Show a node and its nearest neighbours in position space
    Neighbors {
        id: String,
        #[arg(long, default_value_t = 5)]
        k: usize,
    },
    /// Check cold-tier database health and hot-tier consistency
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TiergraphConfig::load_from(path)?,
        None => TiergraphConfig::load()?,
    };

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Import { file, limit } => cli::import::import(&config, &file, limit),
        Command::Stats => cli::stats::stats(&config),
        Command::Ignite { k } => cli::passes::ignite(&config, k),
        Command::Layout => cli::passes::layout(&config),
        Command::Fold => cli::passes::fold(&config),
        Command::Metabolize => cli::maintenance::metabolize(&config),
        Command::Tier { capacity } => cli::maintenance::tier(&config, capacity),
        Command::Recall { ids } => cli::maintenance::recall(&config, &ids),
        Command::Neighbors { id, k } => cli::neighbors::neighbors(&config, &id, k),
        Command::Doctor => cli::doctor::doctor(&config),
    }
}
