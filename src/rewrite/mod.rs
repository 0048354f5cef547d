// src/rewrite/mod.rs
// =============================================================================
// This module rewrites fetched HTML pages so they work offline.
//
// Submodules:
// - html: finds reference-bearing elements, downloads what they point to,
//   and retargets their attributes at the local copies
// =============================================================================

mod html;

pub use html::Rewriter;
