// src/crawl/queue.rs
// =============================================================================
// This module implements the mirror crawl with a breadth-first queue.
//
// How it works:
// 1. Clear the output directory and seed the queue with the root URL
// 2. Pop a URL; skip it if it was already handled
// 3. Download the page to its local path and read it back as text
// 4. Rewrite the page: same-origin references are downloaded and pointed at
//    their local copies
// 5. Save the rewritten page over the downloaded one and mark it visited
// 6. In recursive mode, queue the same-origin anchors found in step 4
// 7. Repeat until the queue is empty
//
// Everything runs one URL at a time. A URL that fails at any step is logged
// and dropped; it is never retried and never stops the crawl.
//
// Rust concepts:
// - HashSet: To track handled URLs (O(1) lookup)
// - VecDeque: Double-ended queue for breadth-first crawling
// - Borrowing: The session lends its state to the Rewriter for each page
// =============================================================================

use anyhow::{anyhow, Result};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{self, Fetcher};
use crate::mapper::{self, SiteScope};
use crate::output::OutputRoot;
use crate::rewrite::Rewriter;

/// Which pages get crawled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Traversal {
    /// Only the root page is crawled; its references are localized once.
    #[default]
    SinglePage,
    /// Same-origin anchor targets are crawled as pages too.
    Recursive,
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages_saved: usize,
    pub assets_localized: usize,
    pub failures: usize,
}

// One mirror run
//
// Owns the queue and the two URL sets. The sets hold page keys (absolute URL
// without fragment):
// - visited: pages fully processed (downloaded, rewritten, saved)
// - attempted: every page ever dequeued, including the ones that failed
pub struct CrawlSession<'a> {
    root_url: Url,
    scope: SiteScope,
    output: OutputRoot,
    fetcher: &'a dyn Fetcher,
    traversal: Traversal,
    queue: VecDeque<Url>,
    visited: HashSet<String>,
    attempted: HashSet<String>,
}

impl<'a> CrawlSession<'a> {
    // Creates a session for `root_url` writing into `output_dir`
    //
    // Fails if the root URL is not an http(s) URL with a host.
    pub fn new(root_url: Url, output_dir: impl Into<PathBuf>, fetcher: &'a dyn Fetcher) -> Result<Self> {
        if root_url.scheme() != "http" && root_url.scheme() != "https" {
            return Err(anyhow!("Unsupported URL scheme '{}': {}", root_url.scheme(), root_url));
        }

        let scope = SiteScope::new(&root_url)
            .ok_or_else(|| anyhow!("URL has no host: {}", root_url))?;

        Ok(Self {
            root_url,
            scope,
            output: OutputRoot::new(output_dir),
            fetcher,
            traversal: Traversal::default(),
            queue: VecDeque::new(),
            visited: HashSet::new(),
            attempted: HashSet::new(),
        })
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn output(&self) -> &OutputRoot {
        &self.output
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    // Runs the crawl to completion
    //
    // Only preparing the output directory can fail the run; every per-URL
    // problem is logged and counted in the report instead.
    pub async fn run(&mut self) -> Result<CrawlReport> {
        self.output.prepare().await?;
        info!(host = self.scope.host(), output = %self.output.path().display(), "Mirroring");

        self.visited.clear();
        self.attempted.clear();
        self.queue.clear();
        self.queue.push_back(self.root_url.clone());

        let mut report = CrawlReport::default();

        while let Some(url) = self.queue.pop_front() {
            let key = mapper::page_key(&url);

            // Duplicates are filtered here rather than at enqueue time
            if !self.attempted.insert(key.clone()) {
                debug!(url = %url, "Already handled, skipping");
                continue;
            }

            info!(url = %url, "Crawling");
            self.process_page(&url, key, &mut report).await;
        }

        Ok(report)
    }

    async fn process_page(&mut self, url: &Url, key: String, report: &mut CrawlReport) {
        let path = self.output.page_path(url);

        if let Err(e) = self.output.make_room(&path).await {
            warn!(url = %url, path = %path.display(), error = %e, "Cannot prepare local path");
            report.failures += 1;
            return;
        }

        if !fetch::download(self.fetcher, url, &path).await {
            report.failures += 1;
            return;
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %url, path = %path.display(), error = %e, "Failed to read downloaded HTML");
                report.failures += 1;
                return;
            }
        };

        let html = match String::from_utf8(bytes) {
            Ok(html) => html,
            Err(_) => {
                warn!(url = %url, path = %path.display(), "Downloaded page is not UTF-8 text, leaving it as-is");
                report.failures += 1;
                return;
            }
        };

        let rewriter = Rewriter::new(&self.scope, &self.output, self.fetcher, &self.visited);
        let document = match rewriter.rewrite(&html, url).await {
            Ok(document) => document,
            Err(e) => {
                warn!(url = %url, path = %path.display(), error = %e, "Failed to rewrite page");
                report.failures += 1;
                return;
            }
        };

        report.assets_localized += document.localized;
        report.failures += document.failures;

        if let Err(e) = tokio::fs::write(&path, document.html).await {
            warn!(url = %url, path = %path.display(), error = %e, "Failed to save rewritten page");
            report.failures += 1;
            return;
        }

        info!(url = %url, path = %path.display(), "Saved");
        self.visited.insert(key);
        report.pages_saved += 1;

        if self.traversal == Traversal::Recursive {
            for anchor in document.anchors {
                if !self.attempted.contains(&mapper::page_key(&anchor)) {
                    self.queue.push_back(anchor);
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why two sets (visited and attempted)?
//    - visited only holds pages that were saved successfully
//    - attempted also holds pages that failed, so they are never retried
//    - The dequeue check uses attempted; the rewriter uses visited to avoid
//      downloading a saved page again (that would overwrite the rewritten copy)
//
// 2. Why does process_page return nothing?
//    - Per-page failures are not errors for the crawl as a whole
//    - They are logged and counted, and the loop moves on
//
// 3. What is &'a dyn Fetcher?
//    - A borrowed trait object: any type implementing Fetcher
//    - main passes the real HTTP fetcher; tests pass an in-memory one
//
// 4. Why is the queue allowed to hold duplicates?
//    - Two pages can link to the same page before it is crawled
//    - Checking at dequeue time keeps the enqueue side simple
// -----------------------------------------------------------------------------
