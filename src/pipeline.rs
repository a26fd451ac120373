//! Crawl pipeline orchestration.
//!
//! 1. **Prepare**: the sink clears or creates its destination
//! 2. **Discover**: the [`Crawler`] collects up to `num_articles` URLs, sequentially
//! 3. **Extract**: article pages are fetched and parsed, `workers` at a time
//! 4. **Write**: each extracted article goes to the sink, one write at a time
//!
//! Ids follow discovery order starting at 1. A failed article keeps its id
//! and is simply missing from the output; later articles are not renumbered.

use crate::config::Config;
use crate::crawler::Crawler;
use crate::fetcher::Fetch;
use crate::outputs::{ArticleSink, SinkError};
use crate::parser::Extractor;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Default number of article fetches in flight.
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound for the `workers` setting.
pub const MAX_WORKERS: usize = 16;

/// Failures that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("output location could not be prepared: {0}")]
    Prepare(#[source] SinkError),

    #[error("no article URLs discovered from {seeds} seed(s)")]
    NothingDiscovered { seeds: usize },

    #[error("failed to write article {id}: {source}")]
    Sink {
        id: usize,
        #[source]
        source: SinkError,
    },
}

/// Outcome of a completed run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// URLs returned by discovery; every one of them is attempted.
    pub discovered: usize,
    /// Ids of articles written to the sink, ascending.
    pub written: Vec<usize>,
    /// Ids of articles that failed extraction, ascending.
    pub failed: Vec<usize>,
}

impl RunReport {
    pub fn attempted(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

/// Run one crawl: discover, extract, and hand every article to `sink`.
#[instrument(level = "info", skip_all, fields(limit = config.num_articles(), workers = workers))]
pub async fn run<F, S>(
    config: &Config,
    fetcher: &F,
    sink: &mut S,
    workers: usize,
) -> Result<RunReport, PipelineError>
where
    F: Fetch,
    S: ArticleSink,
{
    let t0 = Instant::now();
    sink.prepare().await.map_err(PipelineError::Prepare)?;

    let urls = Crawler::new(fetcher, config).discover().await;
    if urls.is_empty() {
        error!(seeds = config.seed_urls().len(), "Discovery found no article URLs");
        return Err(PipelineError::NothingDiscovered {
            seeds: config.seed_urls().len(),
        });
    }

    let mut report = RunReport {
        discovered: urls.len(),
        ..RunReport::default()
    };
    let extractor = Extractor::new(fetcher, config.selectors().clone());
    let extractor = &extractor;
    let workers = workers.clamp(1, MAX_WORKERS);
    info!(count = urls.len(), workers, "Starting article extraction");

    // `buffered` yields results in discovery order, so writes are sequential
    // and ordered by id even though fetches overlap.
    let mut results = stream::iter(urls.into_iter().enumerate())
        .map(|(i, url)| async move {
            let id = i + 1;
            (id, extractor.extract(&url, id).await)
        })
        .buffered(workers);

    while let Some((id, result)) = results.next().await {
        match result {
            Ok(article) => {
                debug!(id, url = %article.url(), "Writing article");
                let write = async {
                    sink.write_raw(&article).await?;
                    sink.write_meta(&article).await
                };
                if let Err(source) = write.await {
                    error!(id, error = %source, "Sink write failed; aborting run");
                    return Err(PipelineError::Sink { id, source });
                }
                report.written.push(id);
            }
            Err(failure) => {
                warn!(id = failure.id, url = %failure.url, error = %failure.cause, "Skipping article");
                report.failed.push(failure.id);
            }
        }
    }

    info!(
        discovered = report.discovered,
        written = report.written.len(),
        failed = report.failed.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Run complete"
    );
    Ok(report)
}
