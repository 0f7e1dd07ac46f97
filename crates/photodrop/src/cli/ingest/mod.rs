//! The `photodrop ingest` command.

mod batch;
mod setup;
pub mod types;

pub use types::OutputFormat;

use clap::Args;
use photodrop_core::{Attribution, BatchResponse, Config, FileDiscovery, OutputWriter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use batch::{run_batches, RunTotals};
use setup::setup_service;

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Image files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Name recorded as the uploader of every photo
    #[arg(short, long, env = "PHOTODROP_UPLOADER")]
    pub uploader: String,

    /// Caption attached to every photo
    #[arg(short, long)]
    pub caption: Option<String>,

    /// Number of photos processed concurrently (overrides config)
    #[arg(short, long)]
    pub group_size: Option<usize>,

    /// Keep objects and metadata in memory instead of writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Output format for batch responses
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the ingest command.
pub async fn execute(args: IngestArgs, config: Config) -> anyhow::Result<()> {
    let max_files = config.limits.max_files;
    let discovery = FileDiscovery::new(config.processing.clone());
    let service = setup_service(&args, config).await?;

    let files = discovery.discover_all(&args.paths);
    if files.is_empty() {
        tracing::warn!("No supported image files found in {:?}", args.paths);
        return Ok(());
    }
    tracing::info!(
        "Found {} file(s) ({:.1} MB), {} batch(es) of up to {}",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1_000_000.0,
        files.len().div_ceil(max_files.max(1)),
        max_files
    );

    let attribution = Attribution::new(args.uploader.trim(), args.caption.clone());
    let start = Instant::now();
    let (responses, totals) = run_batches(&service, &attribution, &files, max_files).await;
    let elapsed = start.elapsed();

    write_responses(&args, &responses)?;
    print_summary(&totals, elapsed);

    if totals.nothing_ingested() {
        anyhow::bail!("No photos were ingested ({} failed)", totals.failed + totals.unreadable);
    }
    Ok(())
}

/// Write batch responses to the output file or stdout.
fn write_responses(args: &IngestArgs, responses: &[BatchResponse]) -> anyhow::Result<()> {
    match &args.output {
        Some(path) => {
            let file = File::create(path)?;
            let mut writer = OutputWriter::new(BufWriter::new(file), args.format.into(), true);
            writer.write_all(responses)?;
            writer.flush()?;
            tracing::info!("Output written to {:?}", path);
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = OutputWriter::new(stdout.lock(), args.format.into(), true);
            writer.write_all(responses)?;
            writer.flush()?;
        }
    }
    Ok(())
}

/// Print a formatted summary table after ingestion.
fn print_summary(totals: &RunTotals, elapsed: Duration) {
    let total = totals.succeeded + totals.failed + totals.unreadable;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        totals.succeeded as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    let mut err = std::io::stderr().lock();
    let _ = writeln!(err);
    let _ = writeln!(err, "  ====================================");
    let _ = writeln!(err, "               Summary");
    let _ = writeln!(err, "  ====================================");
    let _ = writeln!(err, "    Batches:      {:>8}", totals.batches);
    let _ = writeln!(err, "    Uploaded:     {:>8}", totals.succeeded);
    if totals.failed > 0 {
        let _ = writeln!(err, "    Failed:       {:>8}", totals.failed);
    }
    if totals.unreadable > 0 {
        let _ = writeln!(err, "    Unreadable:   {:>8}", totals.unreadable);
    }
    if totals.rejected_batches > 0 {
        let _ = writeln!(err, "    Rejected:     {:>8} batch(es)", totals.rejected_batches);
    }
    let _ = writeln!(err, "  ------------------------------------");
    let _ = writeln!(err, "    Total:        {:>8}", total);
    let _ = writeln!(
        err,
        "    Stored:       {:>7.1} MB",
        totals.processed_bytes as f64 / 1_000_000.0
    );
    let _ = writeln!(err, "    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    let _ = writeln!(err, "    Rate:         {:>7.1} img/sec", rate);
    let _ = writeln!(err, "  ====================================");
}
