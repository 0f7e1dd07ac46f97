//! Photodrop CLI - batch photo ingestion.
//!
//! Photodrop normalizes and compresses photos, writes them to object storage
//! and records their metadata, reporting progress per file and tolerating
//! individual failures.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a few photos
//! photodrop ingest beach.jpg dunes.heic --uploader ada
//!
//! # Ingest a directory without touching storage
//! photodrop ingest ./holiday/ --uploader ada --dry-run --format jsonl
//!
//! # View configuration
//! photodrop config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Photodrop - normalize, compress and upload batches of photos.
#[derive(Parser, Debug)]
#[command(name = "photodrop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "PHOTODROP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Process and upload photos in batches
    Ingest(cli::ingest::IngestArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match (&cli.command, cli::resolve_config(cli.config.as_deref())) {
        (_, Ok(config)) => config,
        // `config` subcommands report on the named file themselves; `init` may create it
        (Commands::Config(_), Err(_)) => photodrop_core::Config::default(),
        (_, Err(e)) => return Err(e),
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Photodrop v{}", photodrop_core::VERSION);

    match cli.command {
        Commands::Ingest(args) => cli::ingest::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, cli.config.as_deref()).await,
    }
}
