//! Search-page traversal that discovers candidate listings
//!
//! Discovery walks each configured category's search pages in order,
//! collecting listing summaries that are not yet in the store. Traversal
//! of a category ends when a page comes back empty, when the page cap is
//! reached, or early once a nonzero fetch limit is already covered by the
//! candidates found so far.

use crate::config::MarketplaceConfig;
use crate::crawler::backoff::{fetch_with_retry, Clock, RetryOutcome, RetryPolicy};
use crate::crawler::extractor::{DiscoveredListing, Extractor};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::CancelFlag;
use crate::listing::ListingId;
use crate::store::ListingStore;
use std::collections::HashSet;
use url::Url;

/// Result of the discovery phase
#[derive(Debug)]
pub struct DiscoveryOutcome {
    /// Candidate listings absent from the store, in traversal order
    pub listings: Vec<DiscoveredListing>,

    /// Search pages that could not be fetched or extracted
    pub failures: u64,
}

/// Builds the URL of one category search page
pub(crate) fn search_page_url(base_url: &str, category: &str, page: u32) -> String {
    format!(
        "{}/l/{}/p/{}/",
        base_url.trim_end_matches('/'),
        category,
        page
    )
}

/// Drives the discovery traversal against the capability seams
pub struct Discoverer<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub extractor: &'a dyn Extractor,
    pub clock: &'a dyn Clock,
    pub policy: RetryPolicy,
    pub marketplace: &'a MarketplaceConfig,
    pub max_search_pages: u32,
    pub cancel: &'a CancelFlag,
}

impl Discoverer<'_> {
    /// Enumerates candidate listings not yet present in the store
    ///
    /// A failing search page fails only its own category for this run;
    /// the remaining categories are still traversed.
    pub async fn discover(&self, store: &ListingStore, fetch_limit: u32) -> DiscoveryOutcome {
        let mut listings: Vec<DiscoveredListing> = Vec::new();
        let mut seen: HashSet<ListingId> = HashSet::new();
        let mut failures = 0u64;

        let base = match Url::parse(&self.marketplace.base_url) {
            Ok(base) => base,
            Err(e) => {
                tracing::error!(
                    "Invalid marketplace base URL '{}': {}",
                    self.marketplace.base_url,
                    e
                );
                return DiscoveryOutcome {
                    listings,
                    failures: 1,
                };
            }
        };

        'categories: for category in &self.marketplace.categories {
            for page in 1..=self.max_search_pages {
                if self.cancel.is_cancelled() {
                    tracing::info!("Cancellation observed during discovery");
                    break 'categories;
                }

                if fetch_limit > 0 && listings.len() >= fetch_limit as usize {
                    tracing::debug!(
                        "Fetch limit {} already covered by discovered candidates",
                        fetch_limit
                    );
                    break 'categories;
                }

                let url = search_page_url(&self.marketplace.base_url, category, page);

                let html = match fetch_with_retry(
                    self.fetcher,
                    &url,
                    self.policy,
                    self.clock,
                    self.cancel,
                )
                .await
                {
                    RetryOutcome::Fetched(html) => html,
                    RetryOutcome::Failed(e) => {
                        tracing::warn!("Failed to fetch search page {}: {}", url, e);
                        failures += 1;
                        continue 'categories;
                    }
                    RetryOutcome::Cancelled => break 'categories,
                };

                let page_listings = match self.extractor.search_page(&html, &base) {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::warn!("Failed to extract search page {}: {}", url, e);
                        failures += 1;
                        continue 'categories;
                    }
                };

                if page_listings.is_empty() {
                    tracing::debug!(
                        "Ran out of listings for category '{}' at page {}",
                        category,
                        page
                    );
                    continue 'categories;
                }

                for discovered in page_listings {
                    if store.contains(&discovered.id) {
                        continue;
                    }
                    if seen.insert(discovered.id.clone()) {
                        listings.push(discovered);
                    }
                }
            }
        }

        tracing::info!(
            "Discovery found {} candidate listings ({} failed search pages)",
            listings.len(),
            failures
        );

        DiscoveryOutcome { listings, failures }
    }
}
