// src/fetch/http.rs
// =============================================================================
// This module downloads resources over HTTP with reqwest.
//
// Key functionality:
// - Makes a plain GET request and follows redirects to the final resource
// - Always sends the same browser-like User-Agent header
// - Treats any non-2xx status as a failure (nothing is written)
// - Writes the body to the destination file, creating parent directories
//
// Rust concepts:
// - async/await: Network and file IO without blocking the runtime
// - #[async_trait]: Lets an async method live behind `dyn Fetcher`
// - map_err: Converting library errors into our FetchError
// =============================================================================

use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{FetchError, Fetcher};

/// User-Agent sent with every request.
///
/// Some sites refuse requests that do not look like they come from a browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// How many redirects we follow before giving up
const MAX_REDIRECTS: usize = 10;

// Only the connection phase is bounded; slow bodies are allowed to finish
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Fetcher backed by a reqwest client
//
// The client is built once and reused for every download (connection pooling).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<(), FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| categorize_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if response.url() != url {
            debug!(url = %url, final_url = %response.url(), "Followed redirect");
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| categorize_error(url, e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        Ok(())
    }
}

// Sorts reqwest errors into our failure categories
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - Too many redirects
// - DNS / connection / TLS failures
// - Body read failures
fn categorize_error(url: &Url, error: reqwest::Error) -> FetchError {
    let url = url.to_string();

    if error.is_timeout() {
        FetchError::Timeout { url }
    } else if error.is_redirect() {
        FetchError::TooManyRedirects { url }
    } else if error.is_connect() {
        FetchError::Connect { url, source: error }
    } else {
        FetchError::Network { url, source: error }
    }
}
