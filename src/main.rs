//! # News Crawler
//!
//! Discovers news articles on listing (seed) pages, fetches and parses each
//! one, and writes its text and metadata to an output directory.
//!
//! ## Usage
//!
//! ```sh
//! news_crawler -c ./scrapper_config.json -o ./tmp/articles
//! ```
//!
//! ## Architecture
//!
//! 1. **Configuration**: load and validate the JSON config; nothing touches the network before this
//! 2. **Discovery**: walk seed pages in order, collecting article links up to the quota
//! 3. **Extraction**: fetch each article (a few at a time) and parse text, title, author, date, topics
//! 4. **Output**: write `{id}_raw.txt` and `{id}_meta.json` per article
//!
//! ## Exit codes
//!
//! - `0`: run completed, even if individual articles failed
//! - `1`: output directory unusable, HTTP client unavailable, or no article URLs found
//! - `2`: invalid configuration
//! - `130`: interrupted

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod crawler;
mod dates;
mod fetcher;
mod models;
mod outputs;
mod parser;
mod pipeline;
mod utils;

use cli::Cli;
use config::Config;
use fetcher::{HttpFetcher, RetryFetch};
use outputs::files::FileSink;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_crawler starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, args.workers, args.retries, "Parsed CLI arguments");

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args.config.display(), error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };
    info!(
        seeds = config.seed_urls().len(),
        num_articles = config.num_articles(),
        "Loaded configuration"
    );
    if config.headless_mode() {
        warn!("headless_mode is set, but pages are fetched without a browser");
    }

    let http = match HttpFetcher::new(&config) {
        Ok(http) => http,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let fetcher = RetryFetch::new(http, args.retries, Duration::from_millis(500));
    let mut sink = FileSink::new(&args.output_dir);

    let code = tokio::select! {
        result = pipeline::run(&config, &fetcher, &mut sink, args.workers) => match result {
            Ok(report) => {
                info!(
                    discovered = report.discovered,
                    attempted = report.attempted(),
                    written = report.written.len(),
                    failed = ?report.failed,
                    output_dir = %args.output_dir.display(),
                    "Crawl finished"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Crawl aborted");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; in-flight fetches dropped");
            ExitCode::from(130)
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    code
}
