//! Content sources
//!
//! A [`ContentSource`] turns a URL into page text. Transport-level retries
//! live here, below the chapter worker: the worker only sees "text" or
//! "nothing", and retries semantic failures on its own.

use crate::config::{FetchConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::{IsRetryable, with_retry};
use async_trait::async_trait;

/// Fetches raw page text
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch `url`, returning `None` when the page is unavailable
    ///
    /// Implementations retry transient failures themselves and report
    /// permanent ones (4xx, exhausted retries) as `None` rather than erroring.
    async fn fetch(&self, url: &str) -> Option<String>;
}

/// HTTP content source backed by `reqwest`
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    backoff: RetryConfig,
    retry_statuses: Vec<u16>,
}

impl HttpSource {
    /// Create a source with the given fetch settings
    ///
    /// Transport retries use `retry`'s backoff curve with
    /// `fetch.transport_attempts` total attempts.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(fetch: &FetchConfig, retry: &RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch.timeout)
            .user_agent(fetch.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            backoff: RetryConfig {
                max_attempts: fetch.transport_attempts,
                ..retry.clone()
            },
            retry_statuses: fetch.retry_statuses.clone(),
        })
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchFailure::classify(Error::Network(e)))?;

        let status = response.status();
        if !status.is_success() {
            let error = Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            };
            return Err(if self.retry_statuses.contains(&status.as_u16()) {
                FetchFailure::Transient(error)
            } else {
                FetchFailure::Permanent(error)
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchFailure::classify(Error::Network(e)))
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn fetch(&self, url: &str) -> Option<String> {
        match with_retry(&self.backoff, || self.fetch_once(url)).await {
            Ok(body) => Some(body),
            Err(failure) => {
                tracing::warn!(url = %url, error = %failure, "Page unavailable");
                None
            }
        }
    }
}

/// Transport failure, split by whether the status list or error kind allows a retry
#[derive(Debug)]
enum FetchFailure {
    Transient(Error),
    Permanent(Error),
}

impl FetchFailure {
    fn classify(error: Error) -> Self {
        if error.is_retryable() {
            FetchFailure::Transient(error)
        } else {
            FetchFailure::Permanent(error)
        }
    }
}

impl IsRetryable for FetchFailure {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchFailure::Transient(_))
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Transient(e) | FetchFailure::Permanent(e) => write!(f, "{e}"),
        }
    }
}
