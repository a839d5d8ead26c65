//! HTTP fetcher implementation
//!
//! This module defines the fetch capability seam and its production
//! implementation over reqwest, classifying failures into the signals the
//! scheduler acts on:
//!
//! | Condition                 | Signal        |
//! |---------------------------|---------------|
//! | HTTP 429 / HTTP 403       | `RateLimited` |
//! | Request/connect timeout   | `Timeout`     |
//! | Other non-success status  | `Transport`   |
//! | Connection/protocol error | `Transport`   |

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Failure modes of a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote site is refusing traffic due to request volume;
    /// the caller should back off and retry
    #[error("Rate limited by remote site")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Fetch capability: retrieve the HTML body behind a URL
///
/// Injected into the scheduler so runs can be driven against fakes in
/// tests; never a process-wide singleton.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Builds the HTTP client used by [`HttpFetcher`]
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Production fetcher over a shared reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();

        // The marketplace answers both 429 and 403 when it wants a crawler
        // to slow down, so both count as rate-limit signals.
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {}", status.as_u16())));
        }

        response.text().await.map_err(classify_request_error)
    }
}

fn classify_request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}
