//! Subcommand definitions and handlers.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use blockcache_core::cache::{cached_heights, namespace_prefix};
use blockcache_core::{AppConfig, CacheDb, CachedFetcher, RecordSource, RangeReport, clear as clear_namespace};
use clap::{Args, Parser, Subcommand};

/// Idempotent block downloader backed by a local cache.
#[derive(Debug, Parser)]
#[command(name = "blockcache", version)]
pub struct Cli {
    /// Emit logs as JSON.
    #[arg(long = "json", global = true)]
    pub json_logs: bool,

    /// Override the cache database path.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Override the per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download every block with START <= height <= END, skipping cached ones.
    Download(DownloadArgs),

    /// Delete every cached block in the configured namespace.
    Clear,

    /// Print the heights currently cached.
    List,
}

/// Arguments for the `download` subcommand.
///
/// Negative heights count back from the chain tip, `-1` being the tip.
#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// First height of the range.
    #[arg(allow_negative_numbers = true)]
    pub start: i64,

    /// Last height of the range, inclusive.
    #[arg(allow_negative_numbers = true)]
    pub end: i64,
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.db_path {
            config.db_path = path.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<CacheDb> {
    CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))
}

pub async fn download<R: RecordSource>(config: &AppConfig, source: R, args: DownloadArgs) -> Result<()> {
    let store = open_store(config).await?;
    let fetcher = CachedFetcher::new(store, source, config.namespace.clone())?;

    let report = fetcher
        .ensure_range(args.start, args.end)
        .await
        .with_context(|| format!("downloading blocks {}..={}", args.start, args.end))?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &RangeReport) {
    for entry in &report.entries {
        println!("- {}", entry.summary.describe(entry.height));
    }
    println!(
        "heights {}..={}: {} cached, {} downloaded",
        report.range.start,
        report.range.end,
        report.hits(),
        report.fetched()
    );
}

pub async fn clear(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let report = clear_namespace(&store, &namespace_prefix(&config.namespace)).await?;

    for key in &report.removed {
        println!("Deleted {key}");
    }
    for (key, reason) in &report.failed {
        eprintln!("Failed to delete {key}: {reason}");
    }

    if !report.is_complete() {
        bail!("{} of {} deletions failed", report.failed.len(), report.failed.len() + report.removed.len());
    }
    Ok(())
}

pub async fn list(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let heights = cached_heights(&store, &config.namespace).await?;

    for height in &heights {
        println!("{height}");
    }
    tracing::info!(count = heights.len(), namespace = %config.namespace, "cached heights");
    Ok(())
}
