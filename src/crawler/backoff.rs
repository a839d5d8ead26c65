//! Rate-limit backoff policy and the injectable clock
//!
//! Retry-with-sleep is an explicit bounded loop over a clock trait, so
//! retry behavior is deterministic in tests and never hangs in production.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::CancelFlag;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Bounded retry policy for rate-limited fetches
///
/// `max_attempts` counts fetch attempts, not retries: a policy with
/// `max_attempts = 3` fetches at most three times, sleeping `wait`
/// between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub wait: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.rate_limit_max_attempts,
            wait: config.rate_limit_wait(),
        }
    }
}

/// Time source and sleep capability injected into the crawl engine
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Production clock: system time and the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of a fetch driven through the retry loop
#[derive(Debug)]
pub enum RetryOutcome {
    /// The fetch succeeded within the attempt bound
    Fetched(String),

    /// The fetch failed; rate-limit failures surface here once the
    /// attempt bound is exhausted
    Failed(FetchError),

    /// Cancellation was observed before or between attempts
    Cancelled,
}

/// Fetches a URL, waiting and retrying on rate-limit signals
///
/// Non-rate-limit failures (timeout, transport) are returned immediately;
/// only `RateLimited` triggers the sleep-and-retry loop. The cancellation
/// flag is re-checked before every attempt so an operator interrupt is
/// never stalled behind a backoff sleep chain.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: RetryPolicy,
    clock: &dyn Clock,
    cancel: &CancelFlag,
) -> RetryOutcome {
    let mut attempts = 0;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled;
        }

        match fetcher.fetch(url).await {
            Ok(html) => return RetryOutcome::Fetched(html),
            Err(FetchError::RateLimited) => {
                attempts += 1;
                if attempts >= policy.max_attempts {
                    tracing::warn!(
                        "Rate limited fetching {} after {} attempts, giving up",
                        url,
                        attempts
                    );
                    return RetryOutcome::Failed(FetchError::RateLimited);
                }

                tracing::warn!(
                    "Rate limited fetching {}. Retrying in {:?} (attempt {}/{})",
                    url,
                    policy.wait,
                    attempts,
                    policy.max_attempts
                );
                clock.sleep(policy.wait).await;
            }
            Err(e) => return RetryOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedFetcher {
        responses: Mutex<Vec<Result<String, FetchError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<String, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(FetchError::RateLimited)
            } else {
                responses.remove(0)
            }
        }
    }

    struct RecordingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingClock {
        fn new() -> Self {
            Self {
                sleeps: Mutex::new(Vec::new()),
            }
        }

        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for RecordingClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn create_test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            wait: Duration::from_secs(7),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let fetcher = ScriptedFetcher::new(vec![Ok("<html>".to_string())]);
        let clock = RecordingClock::new();

        let outcome = fetch_with_retry(
            &fetcher,
            "https://example.com/v/1",
            create_test_policy(),
            &clock,
            &CancelFlag::new(),
        )
        .await;

        assert!(matches!(outcome, RetryOutcome::Fetched(body) if body == "<html>"));
        assert_eq!(fetcher.call_count(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_retry_bound_is_respected() {
        // Permanently rate limited: exactly max_attempts fetches, then failure
        let fetcher = ScriptedFetcher::new(vec![]);
        let clock = RecordingClock::new();

        let outcome = fetch_with_retry(
            &fetcher,
            "https://example.com/v/1",
            create_test_policy(),
            &clock,
            &CancelFlag::new(),
        )
        .await;

        assert!(matches!(outcome, RetryOutcome::Failed(FetchError::RateLimited)));
        assert_eq!(fetcher.call_count(), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(7), Duration::from_secs(7)]
        );
    }

    #[tokio::test]
    async fn test_recovery_after_rate_limit() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::RateLimited),
            Ok("body".to_string()),
        ]);
        let clock = RecordingClock::new();

        let outcome = fetch_with_retry(
            &fetcher,
            "https://example.com/v/1",
            create_test_policy(),
            &clock,
            &CancelFlag::new(),
        )
        .await;

        assert!(matches!(outcome, RetryOutcome::Fetched(_)));
        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::Transport(
            "connection reset".to_string(),
        ))]);
        let clock = RecordingClock::new();

        let outcome = fetch_with_retry(
            &fetcher,
            "https://example.com/v/1",
            create_test_policy(),
            &clock,
            &CancelFlag::new(),
        )
        .await;

        assert!(matches!(outcome, RetryOutcome::Failed(FetchError::Transport(_))));
        assert_eq!(fetcher.call_count(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_fetching() {
        let fetcher = ScriptedFetcher::new(vec![Ok("body".to_string())]);
        let clock = RecordingClock::new();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let outcome = fetch_with_retry(
            &fetcher,
            "https://example.com/v/1",
            create_test_policy(),
            &clock,
            &cancel,
        )
        .await;

        assert!(matches!(outcome, RetryOutcome::Cancelled));
        assert_eq!(fetcher.call_count(), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let config = CrawlerConfig {
            rate_limit_max_attempts: 4,
            rate_limit_wait_seconds: 30,
            ..CrawlerConfig::default()
        };

        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.wait, Duration::from_secs(30));
    }
}
