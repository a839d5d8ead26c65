//! Marktsweep main entry point
//!
//! This is the command-line interface for the marktsweep marketplace
//! listing crawler.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use marktsweep::config::{load_config_with_hash, Config};
use marktsweep::crawler::{crawl, CancelFlag};
use marktsweep::store::ListingStore;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Marktsweep: a classifieds marketplace listing crawler
///
/// Marktsweep discovers listings on a classifieds marketplace, extracts
/// their fields, and keeps a durable local dataset fresh by recrawling
/// listings once they go stale.
#[derive(Parser, Debug)]
#[command(name = "marktsweep")]
#[command(version)]
#[command(about = "A classifieds marketplace listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the configured fetch limit (0 = unlimited)
    #[arg(short, long)]
    limit: Option<u32>,

    /// Override the configured recrawl threshold in hours
    #[arg(long, value_name = "HOURS")]
    recrawl_hours: Option<f64>,

    /// Validate config and show what would be crawled without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show dataset statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Apply command-line overrides
    if let Some(limit) = cli.limit {
        config.crawler.fetch_limit = limit;
    }
    if let Some(hours) = cli.recrawl_hours {
        anyhow::ensure!(
            hours.is_finite() && hours >= 0.0,
            "--recrawl-hours must be a finite value >= 0, got {}",
            hours
        );
        config.crawler.recrawl_hours = hours;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("marktsweep=info,warn"),
            1 => EnvFilter::new("marktsweep=debug,info"),
            2 => EnvFilter::new("marktsweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Marktsweep Dry Run ===\n");

    println!("Crawler Configuration:");
    if config.crawler.fetch_limit == 0 {
        println!("  Fetch limit: unlimited");
    } else {
        println!("  Fetch limit: {}", config.crawler.fetch_limit);
    }
    println!("  Recrawl threshold: {} hours", config.crawler.recrawl_hours);
    println!(
        "  Rate-limit wait: {}s (at most {} attempts)",
        config.crawler.rate_limit_wait_seconds, config.crawler.rate_limit_max_attempts
    );
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_seconds);
    println!(
        "  Max search pages per category: {}",
        config.crawler.max_search_pages
    );

    println!("\nMarketplace:");
    println!("  Base URL: {}", config.marketplace.base_url);
    println!("  Categories ({}):", config.marketplace.categories.len());
    for slug in &config.marketplace.categories {
        println!("    - {}", slug);
    }

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir);

    let store = ListingStore::open(Path::new(&config.output.data_dir))?;
    let stale = store
        .stale_ids(config.crawler.recrawl_threshold(), Utc::now())
        .len();

    println!("\n✓ Configuration is valid");
    println!(
        "✓ {} known listings, {} due for recrawl",
        store.len(),
        stale
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the listing dataset
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = ListingStore::open(Path::new(&config.output.data_dir))?;
    println!("Dataset: {}\n", store.path().display());

    if store.is_empty() {
        println!("No listings recorded yet.");
        return Ok(());
    }

    let now = Utc::now();
    let stale = store
        .stale_ids(config.crawler.recrawl_threshold(), now)
        .len();
    let oldest_check = store.records().map(|r| r.last_checked).min();
    let newest_sighting = store.records().map(|r| r.first_seen).max();

    println!("=== Dataset Statistics ===\n");
    println!("  Listings: {}", store.len());
    println!(
        "  Due for recrawl: {} (threshold {} hours)",
        stale, config.crawler.recrawl_hours
    );
    if let Some(oldest) = oldest_check {
        println!("  Oldest check: {}", oldest.to_rfc3339());
    }
    if let Some(newest) = newest_sighting {
        println!("  Most recent first sighting: {}", newest.to_rfc3339());
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config) -> anyhow::Result<()> {
    let cancel = CancelFlag::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; finishing current task and persisting");
            watcher.cancel();
        }
    });

    let report = crawl(config, cancel).await?;

    println!("New listings:  {}", report.new);
    println!("Refreshed:     {}", report.refreshed);
    println!("Failures:      {}", report.failures);

    if report.failures > 0 {
        tracing::warn!(
            "{} tasks failed this run; completed work is committed",
            report.failures
        );
    }

    Ok(())
}
