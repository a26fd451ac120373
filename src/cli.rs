//! Command-line interface definitions for News Crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Paths can also be provided via environment variables.

use crate::pipeline::DEFAULT_WORKERS;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the News Crawler application.
///
/// # Examples
///
/// ```sh
/// # Crawl with the default config and output locations
/// news_crawler
///
/// # Explicit paths, eight concurrent article fetches
/// news_crawler -c ./scrapper_config.json -o ./tmp/articles -w 8
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the crawler configuration JSON file
    #[arg(short, long, env = "NEWS_CRAWLER_CONFIG", default_value = "scrapper_config.json")]
    pub config: PathBuf,

    /// Output directory for raw text and metadata files (cleared before each run)
    #[arg(short, long, env = "NEWS_CRAWLER_OUTPUT_DIR", default_value = "tmp/articles")]
    pub output_dir: PathBuf,

    /// Number of article pages fetched concurrently (1-16)
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Retries for timeouts, connection errors and 5xx responses
    #[arg(long, default_value_t = 2)]
    pub retries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["news_crawler"]);
        assert_eq!(cli.workers, DEFAULT_WORKERS);
        assert_eq!(cli.retries, 2);
        assert_eq!(cli.output_dir, PathBuf::from("tmp/articles"));
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "news_crawler",
            "--config",
            "./config.json",
            "--output-dir",
            "./out",
            "--retries",
            "0",
        ]);

        assert_eq!(cli.config, PathBuf::from("./config.json"));
        assert_eq!(cli.output_dir, PathBuf::from("./out"));
        assert_eq!(cli.retries, 0);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["news_crawler", "-c", "/tmp/c.json", "-o", "/tmp/out", "-w", "8"]);

        assert_eq!(cli.config, PathBuf::from("/tmp/c.json"));
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cli.workers, 8);
    }
}
