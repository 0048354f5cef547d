// src/mapper.rs
// =============================================================================
// This module turns URLs into local file paths inside the output directory.
//
// Rules:
// - Only the URL path matters: query strings and fragments are dropped, so two
//   URLs that differ only by query share one local file (last write wins)
// - A path ending in '/' (including the bare site root) maps to index.html
// - Empty, '.' and '..' segments are dropped, so a mapped path can never
//   leave the output directory
// - A file name without an extension gets '.html' appended
//
// It also owns the same-origin test: a URL belongs to the mirrored site when
// its host equals the root URL's host (scheme and port are ignored).
//
// Rust concepts:
// - PathBuf: An owned, growable filesystem path
// - Option<T>: For lookups that may have no answer (URLs without a host)
// =============================================================================

use std::path::{Path, PathBuf};
use url::Url;

// File name used for directory-like URLs
pub const INDEX_FILE: &str = "index.html";

// Extension appended to extensionless file names
const HTML_EXTENSION: &str = "html";

// The host that defines which URLs are "ours"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    host: String,
}

impl SiteScope {
    // Builds the scope from the root URL
    // Returns None for URLs without a host (mailto:, data:, file:, ...)
    pub fn new(root: &Url) -> Option<Self> {
        root.host_str().map(|host| Self {
            host: host.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// True when `url` is on the same host as the root URL.
    pub fn contains(&self, url: &Url) -> bool {
        url.host_str() == Some(self.host.as_str())
    }
}

// Maps a URL to its local file path under `root`
//
// This is a pure function: it never looks at the filesystem, so mapping the
// same URL twice always yields the same path.
//
// Examples (root = "out"):
//   http://example.com/            -> out/index.html
//   http://example.com/about       -> out/about.html
//   http://example.com/blog/       -> out/blog/index.html
//   http://example.com/css/app.css -> out/css/app.css
pub fn local_path(url: &Url, root: &Path) -> PathBuf {
    let (segments, is_directory) = safe_segments(url);

    let mut path = root.to_path_buf();
    path.extend(segments);
    if is_directory {
        path.push(INDEX_FILE);
    }

    with_html_extension(path)
}

// Maps a page URL to the file the crawl driver should write
//
// Same as local_path, except that a URL whose mapped location is already an
// existing directory on disk targets index.html inside that directory.
pub fn page_path(url: &Url, root: &Path) -> PathBuf {
    let (segments, is_directory) = safe_segments(url);

    let mut path = root.to_path_buf();
    path.extend(segments);
    if is_directory || path.is_dir() {
        path.push(INDEX_FILE);
        return path;
    }

    with_html_extension(path)
}

// Renders a mapped path as an attribute value relative to `root`
//
// Always uses '/' separators so the result is a valid relative URL on every
// platform. Returns None if `path` is not inside `root`.
pub fn relative_reference(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        return None;
    }

    Some(parts.join("/"))
}

// Default output directory for a root URL: its host, plus ":port" when the
// URL spells out a non-default port
pub fn default_output_dir(root: &Url) -> Option<PathBuf> {
    let host = root.host_str()?;

    let dir = match root.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Some(PathBuf::from(dir))
}

// The identity of a crawl target: the absolute URL without its fragment
pub fn page_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.to_string()
}

// The identity of a local file: scheme, host and path only
//
// Every URL with the same resource key maps to the same local path.
pub fn resource_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.set_query(None);
    key.to_string()
}

// Splits the URL path into segments that are safe to join onto a directory,
// and reports whether the path names a directory (ends with '/')
fn safe_segments(url: &Url) -> (Vec<&str>, bool) {
    let path = url.path();

    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect();

    let is_directory = segments.is_empty() || path.ends_with('/');

    (segments, is_directory)
}

// Appends ".html" to a path whose file name has no extension
fn with_html_extension(mut path: PathBuf) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension(HTML_EXTENSION);
    }
    path
}
