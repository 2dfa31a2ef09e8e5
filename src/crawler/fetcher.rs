//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - GET requests for listing pages (long timeout)
//! - GET requests for media bytes (short timeout)
//! - Error classification
//!
//! Every call is a single attempt. Whether a failure is fatal is decided by the
//! caller: a failed listing page ends the crawl, a failed media download only
//! drops that record's visual.

use crate::config::CrawlerConfig;
use crate::FetchError;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Maximum redirect hops followed for a single request
const MAX_REDIRECTS: usize = 10;

/// Document and media source shared by the crawl controller and visual resolver
///
/// Cloning is cheap; both clients are reference counted internally.
#[derive(Debug, Clone)]
pub struct Fetcher {
    page_client: Client,
    media_client: Client,
}

impl Fetcher {
    /// Builds a fetcher from the crawler configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration (user agent and timeouts)
    ///
    /// # Returns
    ///
    /// * `Ok(Fetcher)` - Successfully built both HTTP clients
    /// * `Err(reqwest::Error)` - Failed to build a client
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let page_client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.page_timeout_secs),
        )?;
        let media_client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.media_timeout_secs),
        )?;

        Ok(Self {
            page_client,
            media_client,
        })
    }

    /// Fetches a listing page and returns its HTML body
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!("Fetching page {}", url);

        let response = send(&self.page_client, url).await?;
        response.text().await.map_err(|e| classify_error(url, e))
    }

    /// Downloads media and returns the raw bytes
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!("Downloading media {}", url);

        let response = send(&self.media_client, url).await?;
        let bytes = response.bytes().await.map_err(|e| classify_error(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent string sent with every request
/// * `timeout` - Total request timeout, including reading the body
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends a GET request and rejects non-success statuses
async fn send(client: &Client, url: &str) -> Result<reqwest::Response, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = error.status() {
        FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: error,
        }
    }
}
