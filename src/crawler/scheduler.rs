//! Crawl scheduling and recrawl engine
//!
//! The scheduler produces the finite, ordered task list for a run —
//! new discoveries before stale recrawls, truncated to the fetch limit —
//! and executes it against the fetch and extraction capabilities,
//! committing every successful upsert to durable storage before moving
//! on. Per-task failures are counted, never fatal.

use crate::config::Config;
use crate::crawler::backoff::{fetch_with_retry, Clock, RetryOutcome, RetryPolicy};
use crate::crawler::discovery::Discoverer;
use crate::crawler::extractor::{DiscoveredListing, Extractor};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::CancelFlag;
use crate::listing::{ListingId, ListingRecord};
use crate::store::{ListingStore, UpsertOutcome};
use crate::SweepError;
use std::collections::HashSet;

/// Why a task was queued this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskReason {
    /// Discovered this run and absent from the store
    New,

    /// Known listing whose last check exceeds the staleness threshold
    Stale,
}

/// A single listing fetch the scheduler has decided to run
///
/// Tasks are ephemeral: they exist only during one scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub id: ListingId,
    pub url: String,
    pub reason: TaskReason,
}

/// Counts reported at the end of a run
///
/// A non-zero failure count is reported but does not fail the run:
/// partial progress is always committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Listings added to the store for the first time
    pub new: u64,

    /// Known listings refreshed by a recrawl
    pub refreshed: u64,

    /// Listing tasks and search pages that failed
    pub failures: u64,
}

enum TaskOutcome {
    Inserted,
    Updated,
    Failed,
    Cancelled,
}

/// The crawl scheduler
///
/// Holds the injected capabilities for one run. The store is mutated only
/// through this scheduler, on its own task, so upserts and persists are
/// naturally serialized.
pub struct Scheduler<'a> {
    fetcher: &'a dyn Fetcher,
    extractor: &'a dyn Extractor,
    clock: &'a dyn Clock,
    config: &'a Config,
    cancel: CancelFlag,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        extractor: &'a dyn Extractor,
        clock: &'a dyn Clock,
        config: &'a Config,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            clock,
            config,
            cancel,
        }
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config.crawler)
    }

    /// Builds the ordered task list for this run
    ///
    /// Discovering new inventory takes priority over refreshing old data:
    /// NEW tasks come first, then STALE tasks oldest-checked first. Stale
    /// ids already queued as NEW are dropped, and the merged list is
    /// truncated to the fetch limit when one is set.
    pub fn plan(
        &self,
        store: &ListingStore,
        discovered: Vec<DiscoveredListing>,
    ) -> Vec<CrawlTask> {
        let mut tasks = Vec::new();
        let mut queued: HashSet<ListingId> = HashSet::new();

        for candidate in discovered {
            if store.contains(&candidate.id) {
                continue;
            }
            if queued.insert(candidate.id.clone()) {
                tasks.push(CrawlTask {
                    id: candidate.id,
                    url: candidate.url,
                    reason: TaskReason::New,
                });
            }
        }

        let threshold = self.config.crawler.recrawl_threshold();
        for id in store.stale_ids(threshold, self.clock.now()) {
            if queued.contains(&id) {
                continue;
            }
            if let Some(record) = store.get(&id) {
                tasks.push(CrawlTask {
                    id,
                    url: record.url.clone(),
                    reason: TaskReason::Stale,
                });
            }
        }

        let limit = self.config.crawler.fetch_limit;
        if limit > 0 && tasks.len() > limit as usize {
            tasks.truncate(limit as usize);
        }

        tasks
    }

    /// Runs the full crawl: discovery, planning, execution
    pub async fn run(&self, store: &mut ListingStore) -> Result<RunReport, SweepError> {
        let discovery = Discoverer {
            fetcher: self.fetcher,
            extractor: self.extractor,
            clock: self.clock,
            policy: self.policy(),
            marketplace: &self.config.marketplace,
            max_search_pages: self.config.crawler.max_search_pages,
            cancel: &self.cancel,
        }
        .discover(store, self.config.crawler.fetch_limit)
        .await;

        let tasks = self.plan(store, discovery.listings);
        let new_count = tasks
            .iter()
            .filter(|t| t.reason == TaskReason::New)
            .count();
        tracing::info!(
            "Planned {} tasks ({} new, {} stale)",
            tasks.len(),
            new_count,
            tasks.len() - new_count
        );

        let mut report = self.execute_tasks(&tasks, store).await?;
        report.failures += discovery.failures;

        tracing::info!(
            "Run complete: {} new, {} refreshed, {} failures",
            report.new,
            report.refreshed,
            report.failures
        );
        Ok(report)
    }

    /// Executes planned tasks in order
    ///
    /// Every successful extraction is upserted and persisted before the
    /// next task starts, so a crash during task N never loses tasks
    /// 1..N-1. Cancellation is observed between tasks; the final persist
    /// always runs.
    pub async fn execute_tasks(
        &self,
        tasks: &[CrawlTask],
        store: &mut ListingStore,
    ) -> Result<RunReport, SweepError> {
        let mut report = RunReport::default();

        for task in tasks {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    "Cancellation observed; stopping after {} completed tasks",
                    report.new + report.refreshed
                );
                break;
            }

            match self.execute(task, store).await {
                TaskOutcome::Inserted => report.new += 1,
                TaskOutcome::Updated => report.refreshed += 1,
                TaskOutcome::Failed => report.failures += 1,
                TaskOutcome::Cancelled => break,
            }
        }

        store.persist()?;
        Ok(report)
    }

    async fn execute(&self, task: &CrawlTask, store: &mut ListingStore) -> TaskOutcome {
        let html = match fetch_with_retry(
            self.fetcher,
            &task.url,
            self.policy(),
            self.clock,
            &self.cancel,
        )
        .await
        {
            RetryOutcome::Fetched(html) => html,
            RetryOutcome::Failed(e) => {
                tracing::warn!("Failed to fetch listing {}: {}", task.id, e);
                return TaskOutcome::Failed;
            }
            RetryOutcome::Cancelled => return TaskOutcome::Cancelled,
        };

        let fields = match self.extractor.listing(&html) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("Failed to extract listing {}: {}", task.id, e);
                return TaskOutcome::Failed;
            }
        };

        let record =
            ListingRecord::new(task.id.clone(), task.url.clone(), fields, self.clock.now());
        let outcome = store.upsert(record);

        // Commit completed work before the next task can fail the run
        if let Err(e) = store.persist() {
            tracing::error!("Failed to persist dataset after listing {}: {}", task.id, e);
        }

        match outcome {
            UpsertOutcome::Inserted => {
                tracing::debug!("Added listing {}", task.id);
                TaskOutcome::Inserted
            }
            UpsertOutcome::Updated => {
                tracing::debug!("Refreshed listing {}", task.id);
                TaskOutcome::Updated
            }
        }
    }
}
