use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for marktsweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub marketplace: MarketplaceConfig,
    pub output: OutputConfig,
}

/// Crawl scheduling and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of listing fetches per run (0 = unlimited)
    #[serde(rename = "fetch-limit", default)]
    pub fetch_limit: u32,

    /// Recrawl listings whose last check is at least this many hours old
    #[serde(rename = "recrawl-hours", default = "default_recrawl_hours")]
    pub recrawl_hours: f64,

    /// Seconds to wait before retrying a rate-limited fetch
    #[serde(rename = "rate-limit-wait-seconds", default = "default_wait_seconds")]
    pub rate_limit_wait_seconds: u64,

    /// Maximum fetch attempts for a rate-limited task before it is failed
    #[serde(rename = "rate-limit-max-attempts", default = "default_max_attempts")]
    pub rate_limit_max_attempts: u32,

    /// Seconds before an individual fetch times out
    #[serde(rename = "fetch-timeout-seconds", default = "default_timeout_seconds")]
    pub fetch_timeout_seconds: u64,

    /// Maximum search pages traversed per category during discovery
    #[serde(rename = "max-search-pages", default = "default_max_search_pages")]
    pub max_search_pages: u32,
}

fn default_recrawl_hours() -> f64 {
    24.0
}

fn default_wait_seconds() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_search_pages() -> u32 {
    25
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 0,
            recrawl_hours: default_recrawl_hours(),
            rate_limit_wait_seconds: default_wait_seconds(),
            rate_limit_max_attempts: default_max_attempts(),
            fetch_timeout_seconds: default_timeout_seconds(),
            max_search_pages: default_max_search_pages(),
        }
    }
}

impl CrawlerConfig {
    /// Staleness threshold derived from `recrawl-hours`
    pub fn recrawl_threshold(&self) -> ChronoDuration {
        ChronoDuration::milliseconds((self.recrawl_hours * 3_600_000.0) as i64)
    }

    /// Pause between attempts at a rate-limited fetch
    pub fn rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.rate_limit_wait_seconds)
    }

    /// Per-request timeout for the HTTP fetcher
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

/// Marketplace traversal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    /// Base URL of the marketplace (e.g. "https://www.marktplaats.nl")
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Category slugs whose search pages seed discovery
    pub categories: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the listing dataset file
    #[serde(rename = "data-dir")]
    pub data_dir: String,
}
