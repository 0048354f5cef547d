// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Usage:
//   site-mirror <URL> [--output <DIR>] [--recursive]
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
// =============================================================================

use clap::Parser;
use std::path::PathBuf;

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    version,
    about = "Download a website and convert it into a static offline copy",
    long_about = "site-mirror fetches a page, downloads the same-site stylesheets, scripts, images \
                  and linked pages it references, and rewrites those references to point at the \
                  local copies. The output directory is cleared at the start of every run."
)]
pub struct Cli {
    /// The root URL of the website to download (e.g., https://example.com)
    ///
    /// This is a positional argument (required, no flag needed)
    pub url: String,

    /// Output directory for the offline copy
    ///
    /// Defaults to the host of the root URL (e.g., ./example.com).
    /// WARNING: its existing contents are deleted.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Also crawl same-site pages reached through links
    ///
    /// Without this flag only the root page is rewritten; the pages it links
    /// to are downloaded as-is.
    ///
    /// NOTE: rewritten links are relative to the output directory, so links on
    /// pages saved in subdirectories (e.g. blog/post.html) may not resolve when
    /// the copy is browsed.
    #[arg(long)]
    pub recursive: bool,
}
