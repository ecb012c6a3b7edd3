//! Retrieval of remote photo bytes.
//!
//! Only references that resolve to an `http`/`https` URL are fetched; anything
//! else (relative upload paths, unsupported schemes) is reported as
//! non-remote so the caller can skip it.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Url;

use crate::error::FetchError;

/// Source of photo bytes for remote references.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Short tag used in log lines.
    fn fetcher_tag(&self) -> &'static str;

    /// Retrieves the bytes behind `url`.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Resolves a stored photo reference to a fetchable URL.
///
/// Returns `None` for references that are not absolute `http`/`https` URLs, and
/// for remote URLs whose host does not contain `host_filter` when one is given.
pub fn remote_url(reference: &str, host_filter: Option<&str>) -> Option<Url> {
    let url = Url::parse(reference.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    match host_filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) if !host.contains(&filter.to_ascii_lowercase()) => None,
        _ => Some(url),
    }
}

/// [`AssetFetcher`] backed by a `reqwest` client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, timeout }
    }

    async fn fetch_inner(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    fn fetcher_tag(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        debug!("fetching photo {url}");
        match tokio::time::timeout(self.timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}
