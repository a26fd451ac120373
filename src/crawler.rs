//! Listing-page discovery.
//!
//! The [`Crawler`] walks the configured seed (listing) pages in order, pulls
//! every hyperlink out of each one and keeps those the [`ArticleFilter`]
//! recognises as article pages, until the article quota is met.
//!
//! # URL Pattern
//!
//! With the default rules an article link looks like `/news/12345/headline`
//! (relative or absolute on the seed's host). Section indexes such as
//! `/news/` or `/news/world` have too few path segments and are skipped.
//! Articles are identified by path alone: query strings (tracking tags and
//! the like) and fragments are dropped, so `/news/1/a?utm=x` and `/news/1/a`
//! count once against the quota.

use crate::config::{Config, SiteRules};
use crate::fetcher::Fetch;
use crate::parser::{HtmlPage, PageDocument, PageSelectors};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Predicate deciding whether a link points at an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFilter {
    prefix: String,
    min_segments: usize,
}

impl ArticleFilter {
    pub fn new(prefix: impl Into<String>, min_segments: usize) -> Self {
        Self {
            prefix: prefix.into(),
            min_segments,
        }
    }

    pub fn from_rules(rules: &SiteRules) -> Self {
        Self::new(rules.article_path_prefix.clone(), rules.min_path_segments)
    }

    /// Resolve `href` against the listing page and return the absolute
    /// article URL (query and fragment removed) when it passes the filter.
    pub fn accept(&self, base: &Url, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            return None;
        }

        let mut url = base.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str() != base.host_str() {
            return None;
        }

        let path = url.path();
        if !path.starts_with(&self.prefix) {
            return None;
        }
        let segments = path.split('/').filter(|s| !s.is_empty()).count();
        if segments < self.min_segments {
            return None;
        }

        url.set_query(None);
        url.set_fragment(None);
        Some(url.to_string())
    }
}

/// URLs seen and accepted during one discovery run.
#[derive(Debug, Default)]
pub struct CrawlState {
    seen: HashSet<String>,
    accepted: Vec<String>,
}

impl CrawlState {
    /// Record `url`; returns `false` if it was already accepted.
    fn offer(&mut self, url: String) -> bool {
        if !self.seen.insert(url.clone()) {
            return false;
        }
        self.accepted.push(url);
        true
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }
}

/// Discovers article URLs from seed listing pages.
#[derive(Debug)]
pub struct Crawler<F> {
    fetcher: F,
    seed_queue: VecDeque<String>,
    limit: usize,
    filter: ArticleFilter,
    selectors: PageSelectors,
    state: CrawlState,
}

impl<F: Fetch> Crawler<F> {
    pub fn new(fetcher: F, config: &Config) -> Self {
        Self {
            fetcher,
            seed_queue: config.seed_urls().iter().cloned().collect(),
            limit: config.num_articles(),
            filter: ArticleFilter::from_rules(config.site()),
            selectors: config.selectors().clone(),
            state: CrawlState::default(),
        }
    }

    /// Seed URLs not yet visited.
    pub fn search_urls(&self) -> impl Iterator<Item = &str> {
        self.seed_queue.iter().map(String::as_str)
    }

    /// Run discovery to completion.
    ///
    /// Returns at most `num_articles` URLs in discovery order (seed order,
    /// then link order within a page). Fewer are returned when the seeds run
    /// out first. Seeds that fail to load are logged and skipped.
    #[instrument(level = "info", skip(self), fields(seeds = self.seed_queue.len(), limit = self.limit))]
    pub async fn discover(mut self) -> Vec<String> {
        debug!(seeds = ?self.search_urls().collect::<Vec<_>>(), "Starting discovery");
        while self.state.len() < self.limit {
            let Some(seed) = self.seed_queue.pop_front() else {
                break;
            };

            let response = match self.fetcher.fetch(&seed).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(%seed, error = %e, "Skipping seed that failed to load");
                    continue;
                }
            };

            let Ok(base) = Url::parse(&response.final_url).or_else(|_| Url::parse(&seed)) else {
                warn!(%seed, "Skipping seed with unparseable URL");
                continue;
            };

            let links = HtmlPage::parse(&response.body, &self.selectors).links();
            let (mut accepted, mut rejected, mut duplicate) = (0usize, 0usize, 0usize);
            for href in &links {
                if self.state.len() >= self.limit {
                    break;
                }
                match self.filter.accept(&base, href) {
                    Some(url) if self.state.seen.contains(&url) => duplicate += 1,
                    Some(url) => {
                        self.state.offer(url);
                        accepted += 1;
                    }
                    None => rejected += 1,
                }
            }

            info!(
                %seed,
                status = response.status,
                links = links.len(),
                accepted,
                rejected,
                duplicate,
                total = self.state.len(),
                "Scanned listing page"
            );
        }

        if !self.seed_queue.is_empty() {
            debug!(remaining = self.seed_queue.len(), "Quota reached before all seeds were visited");
        }
        info!(count = self.state.len(), limit = self.limit, "Discovery finished");
        self.state.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::fetcher::FetchError;
    use crate::fetcher::fake::FakeFetcher;

    fn listing(hrefs: &[&str]) -> String {
        let links: String = hrefs
            .iter()
            .map(|h| format!("<li><a href=\"{h}\">link</a></li>"))
            .collect();
        format!("<html><body><ul>{links}</ul></body></html>")
    }

    fn base() -> Url {
        Url::parse("https://www.example.com/news/").unwrap()
    }

    #[test]
    fn test_filter_accepts_article_paths_only() {
        let filter = ArticleFilter::new("/news/", 3);
        assert_eq!(
            filter.accept(&base(), "/news/12345/headline"),
            Some("https://www.example.com/news/12345/headline".to_string())
        );
        assert_eq!(
            filter.accept(&base(), "https://www.example.com/news/1/a#comments"),
            Some("https://www.example.com/news/1/a".to_string())
        );
        assert_eq!(
            filter.accept(&base(), "/news/1/a?utm_source=feed&utm_medium=rss"),
            Some("https://www.example.com/news/1/a".to_string())
        );
        assert_eq!(filter.accept(&base(), "/news/"), None);
        assert_eq!(filter.accept(&base(), "/news/world"), None);
        assert_eq!(filter.accept(&base(), "/sport/1/a"), None);
        assert_eq!(filter.accept(&base(), "https://other.com/news/1/a"), None);
        assert_eq!(filter.accept(&base(), "#top"), None);
        assert_eq!(filter.accept(&base(), "mailto:desk@example.com"), None);
        assert_eq!(filter.accept(&base(), ""), None);
    }

    #[test]
    fn test_filter_resolves_relative_links() {
        let filter = ArticleFilter::new("/news/", 3);
        assert_eq!(
            filter.accept(&base(), "world/77/story"),
            Some("https://www.example.com/news/world/77/story".to_string())
        );
    }

    #[tokio::test]
    async fn test_discover_stops_at_limit_in_order() {
        let seed = "https://www.example.com/news/";
        let fetcher = FakeFetcher::new().page(
            seed,
            &listing(&["/news/", "/news/1/a", "/news/2/b", "/news/1/a", "/news/3/c", "/news/4/d"]),
        );
        let config = test_config(&[seed, "https://www.example.com/news/page2"], 3);

        let urls = Crawler::new(&fetcher, &config).discover().await;
        assert_eq!(
            urls,
            vec![
                "https://www.example.com/news/1/a",
                "https://www.example.com/news/2/b",
                "https://www.example.com/news/3/c",
            ]
        );
        // The second seed is never requested once the quota is met.
        assert_eq!(fetcher.requested(), vec![seed.to_string()]);
    }

    #[tokio::test]
    async fn test_discover_dedups_across_seeds_and_skips_dead_seed() {
        let s1 = "https://www.example.com/news/";
        let s2 = "https://www.example.com/news/dead";
        let s3 = "https://www.example.com/news/world";
        let fetcher = FakeFetcher::new()
            .page(s1, &listing(&["/news/1/a", "/news/2/b", "/news/1/a?utm=x"]))
            .failing(s2, FetchError::Timeout)
            .page(s3, &listing(&["/news/2/b", "/news/world/", "/news/3/c"]));
        let config = test_config(&[s1, s2, s3], 10);

        let urls = Crawler::new(&fetcher, &config).discover().await;
        assert_eq!(
            urls,
            vec![
                "https://www.example.com/news/1/a",
                "https://www.example.com/news/2/b",
                "https://www.example.com/news/3/c",
            ]
        );
        assert_eq!(fetcher.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_discover_short_result_when_seeds_exhausted() {
        let seed = "https://www.example.com/news/";
        let fetcher = FakeFetcher::new().page(seed, &listing(&["/news/", "/news/5/e", "/about"]));
        let config = test_config(&[seed], 5);

        let urls = Crawler::new(&fetcher, &config).discover().await;
        assert_eq!(urls, vec!["https://www.example.com/news/5/e"]);
    }

    #[tokio::test]
    async fn test_discover_all_seeds_dead() {
        let config = test_config(&["https://www.example.com/news/"], 2);
        let fetcher = FakeFetcher::new();
        let crawler = Crawler::new(&fetcher, &config);
        assert_eq!(crawler.search_urls().count(), 1);
        assert!(crawler.discover().await.is_empty());
    }

    #[test]
    fn test_crawl_state_offer() {
        let mut state = CrawlState::default();
        assert_eq!(state.len(), 0);
        assert!(state.offer("a".to_string()));
        assert!(!state.offer("a".to_string()));
        assert!(state.offer("b".to_string()));
        assert_eq!(state.len(), 2);
    }
}
