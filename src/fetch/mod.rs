// src/fetch/mod.rs
// =============================================================================
// This module downloads resources to local files.
//
// Submodules:
// - error: FetchError, the ways a download can fail
// - http: HttpFetcher, the real implementation on top of reqwest
//
// The crawler and the rewriter only ever see the Fetcher trait, so tests can
// plug in an in-memory implementation instead of the network.
// =============================================================================

mod error;
mod http;

pub use error::FetchError;
pub use http::HttpFetcher;

use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};
use url::Url;

/// Something that can retrieve a URL into a file.
///
/// On success exactly one file exists at `dest` holding the response body.
/// On failure nothing is written.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<(), FetchError>;
}

// Runs a fetch and logs the outcome
//
// Returns true when the file was produced. Failures are logged here and never
// propagated: one broken resource must not stop the crawl.
pub async fn download(fetcher: &dyn Fetcher, url: &Url, dest: &Path) -> bool {
    match fetcher.fetch(url, dest).await {
        Ok(()) => {
            info!(url = %url, path = %dest.display(), "Downloaded");
            true
        }
        Err(e) => {
            warn!(url = %url, path = %dest.display(), error = %e, "Failed to download");
            false
        }
    }
}

#[cfg(test)]
pub use testing::StaticFetcher;
