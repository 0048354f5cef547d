// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging (RUST_LOG overrides the default "info" level)
// 2. Parse command-line arguments using clap
// 3. Run the mirror crawl
// 4. Exit with proper code (0 = finished, even if some downloads failed;
//    2 = the run could not start, e.g. bad URL or unusable output directory)
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;       // src/cli.rs - command-line parsing
mod crawl;     // src/crawl/ - the crawl driver
mod fetch;     // src/fetch/ - downloading resources
mod mapper;    // src/mapper.rs - URL to local path mapping
mod output;    // src/output.rs - output directory lifecycle
mod rewrite;   // src/rewrite/ - HTML reference rewriting

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

use cli::Cli;
use crawl::{CrawlSession, Traversal};
use fetch::HttpFetcher;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let root_url = Url::parse(&cli.url).with_context(|| format!("Invalid URL '{}'", cli.url))?;

    let output_dir = match cli.output {
        Some(dir) => dir,
        None => mapper::default_output_dir(&root_url)
            .ok_or_else(|| anyhow!("URL has no host: {}", root_url))?,
    };

    let traversal = if cli.recursive {
        Traversal::Recursive
    } else {
        Traversal::SinglePage
    };

    let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;

    let mut session = CrawlSession::new(root_url, output_dir, &fetcher)?.with_traversal(traversal);
    let report = session.run().await?;

    info!(
        output = %session.output().path().display(),
        pages = report.pages_saved,
        assets = report.assets_localized,
        failures = report.failures,
        "Mirror finished"
    );

    Ok(())
}
