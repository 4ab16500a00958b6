//! Outbound HTTP retrieval of listing pages and document files.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Result, WatchError};

const USER_AGENT: &str = concat!("regwatch/", env!("CARGO_PKG_VERSION"));
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const FILE_TIMEOUT: Duration = Duration::from_secs(60);

/// Downloads listing pages and document bytes.
///
/// Any network failure or non-success status is a [`WatchError::Retrieval`].
#[async_trait]
pub trait Retrieve: Send + Sync {
    /// Fetch a listing page as text.
    async fn get_page(&self, url: &Url) -> Result<String>;

    /// Fetch the full byte payload of a document.
    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

/// [`Retrieve`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    http: Client,
}

impl HttpRetriever {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(8))
            .build()
            .map_err(|e| WatchError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    async fn get(&self, url: &Url, timeout: Duration) -> Result<reqwest::Response> {
        let res = self
            .http
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| WatchError::retrieval(url.as_str(), e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(WatchError::retrieval(
                url.as_str(),
                format!("HTTP status {}", status.as_u16()),
            ));
        }
        Ok(res)
    }
}

#[async_trait]
impl Retrieve for HttpRetriever {
    #[instrument(level = "info", skip(self), fields(%url))]
    async fn get_page(&self, url: &Url) -> Result<String> {
        let body = self
            .get(url, PAGE_TIMEOUT)
            .await?
            .text()
            .await
            .map_err(|e| WatchError::retrieval(url.as_str(), e))?;
        debug!(bytes = body.len(), "Fetched listing page");
        Ok(body)
    }

    #[instrument(level = "info", skip(self), fields(%url))]
    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let body = self
            .get(url, FILE_TIMEOUT)
            .await?
            .bytes()
            .await
            .map_err(|e| WatchError::retrieval(url.as_str(), e))?;
        debug!(bytes = body.len(), "Downloaded document");
        Ok(body.to_vec())
    }
}
