//! Crawler module for listing discovery and recrawl
//!
//! This module contains the core crawl engine, including:
//! - The fetch and extraction capability seams
//! - Search-page discovery of new listings
//! - Rate-limit backoff with bounded retry
//! - The scheduler that plans and executes a run

mod backoff;
mod discovery;
mod extractor;
mod fetcher;
mod scheduler;

pub use backoff::{fetch_with_retry, Clock, RetryOutcome, RetryPolicy, SystemClock};
pub use discovery::{Discoverer, DiscoveryOutcome};
pub use extractor::{DiscoveredListing, ExtractError, Extractor, HtmlExtractor};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
pub use scheduler::{CrawlTask, RunReport, Scheduler, TaskReason};

use crate::config::Config;
use crate::store::ListingStore;
use crate::SweepError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag
///
/// Set from the outside (operator interrupt) and observed by the scheduler
/// between tasks and between retry attempts. Completed work is persisted
/// before the run returns; no task in flight is left partially applied.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a complete crawl against the configured marketplace
///
/// This is the main entry point for a run. It will:
/// 1. Load the listing dataset (fatal if corrupt)
/// 2. Build the HTTP fetcher and HTML extractor
/// 3. Discover new listings and plan the recrawl pass
/// 4. Execute tasks, persisting after every successful upsert
/// 5. Return the run report
pub async fn crawl(config: &Config, cancel: CancelFlag) -> Result<RunReport, SweepError> {
    let mut store = ListingStore::open(Path::new(&config.output.data_dir))?;
    tracing::info!(
        "Loaded {} known listings from {}",
        store.len(),
        store.path().display()
    );

    let fetcher = HttpFetcher::new(config.crawler.fetch_timeout())?;
    let extractor = HtmlExtractor;
    let clock = SystemClock;

    let scheduler = Scheduler::new(&fetcher, &extractor, &clock, config, cancel);
    scheduler.run(&mut store).await
}
