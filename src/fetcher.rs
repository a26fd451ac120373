//! HTTP fetching with typed failures and exponential backoff.
//!
//! # Architecture
//!
//! - [`Fetch`]: core trait, one GET per call, every failure returned as a [`FetchError`]
//! - [`HttpFetcher`]: `reqwest` implementation honouring the configured headers,
//!   timeout, certificate policy and charset
//! - [`RetryFetch`]: decorator adding retries to any [`Fetch`] implementation
//!
//! # Charset
//!
//! Bodies are always decoded with the configured encoding rather than the one
//! the server declares, since listing pages frequently omit or misreport it.

use crate::config::Config;
use encoding_rs::Encoding;
use rand::{Rng, rng};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// A successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code, always in `200..=299`.
    pub status: u16,
    /// Body decoded with the configured encoding.
    pub body: String,
    /// URL after redirects.
    pub final_url: String,
}

/// Recoverable failures of a single request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("non-success status {0}")]
    NonSuccessStatus(u16),

    #[error("body could not be decoded as {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connection(_) => true,
            FetchError::NonSuccessStatus(code) => *code >= 500 || *code == 429,
            FetchError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Connection(e.to_string())
        }
    }
}

/// Trait for fetching a single URL.
///
/// Implementors never panic or raise on network failures; everything is
/// reported through [`FetchError`].
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<Response, FetchError>;
}

impl<T: Fetch> Fetch for &T {
    async fn fetch(&self, url: &str) -> Result<Response, FetchError> {
        (**self).fetch(url).await
    }
}

/// `reqwest`-backed fetcher built once from a [`Config`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    encoding: String,
}

impl HttpFetcher {
    /// Build the underlying client with headers, timeout and TLS policy applied.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        for (k, v) in config.headers() {
            match (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
                (Ok(k), Ok(v)) => {
                    headers.insert(k, v);
                }
                _ => warn!(header = %k, "Skipping header that is not valid HTTP"),
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_certificate())
            .build()?;

        Ok(Self {
            client,
            encoding: config.encoding().to_string(),
        })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Response, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        if !response.status().is_success() {
            debug!(status, "Non-success status");
            return Err(FetchError::NonSuccessStatus(status));
        }

        let bytes = response.bytes().await?;
        let body = decode_body(&bytes, &self.encoding)?;
        debug!(
            status,
            bytes = bytes.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );

        Ok(Response {
            status,
            body,
            final_url,
        })
    }
}

/// Decode raw bytes with the encoding named by `label`.
///
/// Unknown labels and malformed byte sequences are both decode failures.
pub fn decode_body(bytes: &[u8], label: &str) -> Result<String, FetchError> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| FetchError::Decode(label.to_string()))?;
    let text = encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| FetchError::Decode(encoding.name().to_string()))?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`] implementation.
///
/// Only transient failures (see [`FetchError::is_transient`]) are retried.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: Fetch> RetryFetch<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: Fetch> Fetch for RetryFetch<T> {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Response, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(resp) => return Ok(resp),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let shift = (attempt - 1).min(16) as u32;
                    let delay = self
                        .base_delay
                        .saturating_mul(1 << shift)
                        .min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_with(encoding: &str, timeout: u64) -> Config {
        Config::from_value(&json!({
            "seed_urls": ["https://www.example.com/news/"],
            "num_articles": 3,
            "headers": {"User-Agent": "news_crawler-test"},
            "encoding": encoding,
            "timeout": timeout,
            "should_verify_certificate": true
        }))
        .unwrap()
    }

    struct Flaky {
        failures: Vec<FetchError>,
        calls: Cell<usize>,
    }

    impl Fetch for Flaky {
        async fn fetch(&self, url: &str) -> Result<Response, FetchError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            match self.failures.get(n) {
                Some(e) => Err(e.clone()),
                None => Ok(Response {
                    status: 200,
                    body: "ok".to_string(),
                    final_url: url.to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_decode_body_utf8_and_bom() {
        let bytes = "\u{feff}Привет".as_bytes();
        assert_eq!(decode_body(bytes, "utf-8").unwrap(), "Привет");
    }

    #[test]
    fn test_decode_body_windows_1251() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Новости");
        assert_eq!(decode_body(&bytes, "windows-1251").unwrap(), "Новости");
    }

    #[test]
    fn test_decode_body_failures() {
        assert_eq!(
            decode_body(b"abc", "no-such-charset"),
            Err(FetchError::Decode("no-such-charset".to_string()))
        );
        assert!(matches!(
            decode_body(&[0x66, 0xff, 0xfe, 0x66], "utf-8"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::Connection("reset".into()).is_transient());
        assert!(FetchError::NonSuccessStatus(503).is_transient());
        assert!(FetchError::NonSuccessStatus(429).is_transient());
        assert!(!FetchError::NonSuccessStatus(404).is_transient());
        assert!(!FetchError::Decode("utf-8".into()).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let inner = Flaky {
            failures: vec![FetchError::Timeout, FetchError::NonSuccessStatus(502)],
            calls: Cell::new(0),
        };
        let retry = RetryFetch::new(&inner, 3, Duration::from_millis(100));
        let resp = retry.fetch("https://example.com/news/1/a").await.unwrap();
        assert_eq!(resp.body, "ok");
        assert_eq!(inner.calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_retries() {
        let inner = Flaky {
            failures: vec![FetchError::Timeout; 5],
            calls: Cell::new(0),
        };
        let retry = RetryFetch::new(&inner, 2, Duration::from_millis(100));
        assert_eq!(
            retry.fetch("https://example.com/").await,
            Err(FetchError::Timeout)
        );
        assert_eq!(inner.calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_does_not_repeat_permanent_failures() {
        let inner = Flaky {
            failures: vec![FetchError::NonSuccessStatus(404)],
            calls: Cell::new(0),
        };
        let retry = RetryFetch::new(&inner, 5, Duration::from_millis(100));
        assert_eq!(
            retry.fetch("https://example.com/").await,
            Err(FetchError::NonSuccessStatus(404))
        );
        assert_eq!(inner.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_http_fetcher_sends_headers_and_decodes() {
        let server = MockServer::start().await;
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("<p>Главное</p>");
        Mock::given(method("GET"))
            .and(path("/news/"))
            .and(header("User-Agent", "news_crawler-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html; charset=utf-8")
                    .set_body_bytes(bytes.into_owned()),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config_with("windows-1251", 5)).unwrap();
        let url = format!("{}/news/", server.uri());
        let resp = fetcher.fetch(&url).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "<p>Главное</p>");
        assert_eq!(resp.final_url, url);
    }

    #[tokio::test]
    async fn test_http_fetcher_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config_with("utf-8", 5)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/news/missing", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NonSuccessStatus(404));
    }

    #[tokio::test]
    async fn test_http_fetcher_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config_with("utf-8", 1)).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout);
    }

    #[tokio::test]
    async fn test_http_fetcher_connection_error() {
        let fetcher = HttpFetcher::new(&config_with("utf-8", 2)).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Connection(_) | FetchError::Timeout));
    }
}
