//! hashdex CLI
//!
//! Loads records into a sharded hash index and answers lookups from it.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hashdex::{BackgroundLinesSource, Config, HashIndex, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// hashdex
#[derive(Parser, Debug)]
#[command(name = "hashdex")]
#[command(about = "Index records by a hashed field into sharded files and search them")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file (created with defaults if absent)
    #[arg(short, long, default_value = "hashdex-config.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest newline-delimited JSON records into the index
    #[command(alias = "download")]
    Ingest {
        /// Input file (defaults to stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print every distinct value stored for each key read from stdin
    SearchAll,

    /// Print the first value stored for each key read from stdin
    SearchOne,

    /// Remove byte-identical duplicate entries from every shard
    #[command(alias = "optimize")]
    Compact,
}

fn main() {
    let args = Args::parse();

    // Logs go to stderr; stdout carries query results only
    let default_filter = if args.verbose { "info,hashdex=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt()
        .with_env_filter(filter)
        .with_target(args.verbose)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(args) {
        tracing::error!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::load_or_init(&args.config)?;
    let index = HashIndex::new(config)?;

    match args.command {
        Commands::Ingest { input } => {
            let cancel = index.cancel_flag();
            let handler_flag = Arc::clone(&cancel);
            ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

            let mut source = match input {
                Some(path) => BackgroundLinesSource::spawn(BufReader::new(File::open(path)?), cancel),
                None => BackgroundLinesSource::spawn(BufReader::new(io::stdin()), cancel),
            };
            let report = index.ingest_with_progress(&mut source, log_progress)?;
            if report.cancelled {
                tracing::info!("Canceled by user");
            }
            tracing::info!(
                "Ingest completed: {} records read, {} entries written, {} dropped",
                report.read,
                report.written,
                report.dropped
            );
        }
        Commands::SearchAll => answer_queries(&index, false)?,
        Commands::SearchOne => answer_queries(&index, true)?,
        Commands::Compact => {
            let report = index.compact()?;
            tracing::info!(
                "Compaction completed: {} shards, {} duplicate entries removed",
                report.shards.len(),
                report.removed()
            );
        }
    }

    Ok(())
}

/// Answer queries from stdin until it closes
fn answer_queries(index: &HashIndex, exactly_one: bool) -> Result<()> {
    let config = index.config();
    tracing::info!(
        "Enter {} to search for {}. Press Ctrl-D to finish",
        config.key_field,
        config.value_field
    );
    index.search_lines(io::stdin().lock(), io::stdout().lock(), exactly_one)?;
    Ok(())
}

/// Log the processed count every 100k records
fn log_progress(read: u64) {
    if read % 100_000 == 0 {
        tracing::info!(read, "Loading");
    }
}
