// src/fetch/error.rs
// =============================================================================
// Errors a download can end with.
//
// Every variant names the URL so a log line is useful on its own. None of them
// stop a crawl: the caller logs the error and treats the resource as missing.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Request timed out
    #[error("timeout downloading {url}")]
    Timeout { url: String },

    /// Redirect chain was too long (or looped)
    #[error("too many redirects downloading {url}")]
    TooManyRedirects { url: String },

    /// Could not connect (DNS failure, connection refused, TLS handshake, ...)
    #[error("connection failed downloading {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} downloading {url}")]
    HttpStatus { url: String, status: u16 },

    /// Any other transport error (body read, decoding, ...)
    #[error("network error downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Writing the body to disk failed
    #[error("IO error writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
