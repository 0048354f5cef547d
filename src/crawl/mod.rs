// src/crawl/mod.rs
// =============================================================================
// This module drives a mirror run.
//
// Features:
// - Breadth-first crawling starting from the root URL
// - Same-host restriction (other sites are never downloaded)
// - Each page is downloaded, rewritten and saved at most once per run
// - Optional recursion into same-origin anchors
// =============================================================================

mod queue;

// Re-export the crawl session and its knobs
pub use queue::{CrawlSession, Traversal};
