use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur while retrieving a playlist document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to playlist source failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Timed out fetching playlist source")]
    Timeout,

    #[error("HTTP {status} when fetching {url}")]
    Status { status: StatusCode, url: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(e)
        }
    }
}

/// Retrieves the raw text of a playlist document
///
/// Implementations apply their own timeout and never retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<String, FetchError>;
}

/// [`Fetcher`] over plain HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// The timeout is whatever `client` was built with, see
    /// [`crate::util::init_http_client`]
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, source: &str) -> Result<String, FetchError> {
        let res = self.client.get(source).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: source.to_string(),
            });
        }

        let body = res.text().await?;
        debug!("Fetched {} bytes of playlist", body.len());
        Ok(body)
    }
}
