//! Crawler configuration loading and validation.
//!
//! The configuration is read from a JSON document with the following shape:
//!
//! ```json
//! {
//!   "seed_urls": ["https://www.example.com/news/"],
//!   "num_articles": 10,
//!   "headers": {"User-Agent": "Mozilla/5.0"},
//!   "encoding": "utf-8",
//!   "timeout": 10,
//!   "should_verify_certificate": true,
//!   "headless_mode": false,
//!   "site": {"article_path_prefix": "/news/", "min_path_segments": 3}
//! }
//! ```
//!
//! Validation runs field by field in a fixed order and reports the first
//! violation, so every malformed document maps to exactly one
//! [`ConfigError`] kind. A [`Config`] is never partially built.

use crate::parser::PageSelectors;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Upper bound (inclusive) for `num_articles`.
pub const MAX_ARTICLES: u64 = 150;

/// Upper bound (exclusive) for `timeout`, in seconds.
pub const TIMEOUT_MAX: u64 = 60;

static SEED_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://(www\.)?[^\s/]+").expect("seed url regex"));

/// Reasons a configuration source can be rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("seed_urls must be a non-empty list of http(s) URLs")]
    InvalidSeedURL,

    #[error("num_articles must be an integer")]
    InvalidArticleCountType,

    #[error("num_articles must be between 1 and {MAX_ARTICLES}")]
    ArticleCountOutOfRange,

    #[error("headers must be a mapping of strings to strings")]
    InvalidHeaders,

    #[error("encoding must be a known charset label")]
    InvalidEncoding,

    #[error("timeout must be an integer between 1 and {} seconds", TIMEOUT_MAX - 1)]
    InvalidTimeout,

    #[error("should_verify_certificate must be a boolean")]
    InvalidVerifyFlag,

    #[error("headless_mode must be a boolean")]
    InvalidHeadlessFlag,

    #[error("invalid site rules: {0}")]
    InvalidSiteRules(String),
}

/// Site-specific rules for recognising article links and locating content.
///
/// Every field has a default, so the `site` section may be omitted entirely.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SiteRules {
    /// Path prefix shared by every article URL, e.g. `/news/`.
    pub article_path_prefix: String,
    /// Minimum number of non-empty path segments an article path has.
    /// `/news/12345/headline` has three; the `/news/` index has one.
    pub min_path_segments: usize,
    /// CSS selector for body paragraphs.
    pub paragraph_selector: String,
    /// CSS selector for the headline.
    pub title_selector: String,
    /// CSS selector for the byline.
    pub author_selector: String,
    /// CSS selector for the publication date.
    pub date_selector: String,
    /// CSS selector for topic/tag links.
    pub topics_selector: String,
}

impl Default for SiteRules {
    fn default() -> Self {
        Self {
            article_path_prefix: "/news/".to_string(),
            min_path_segments: 3,
            paragraph_selector: "article p, .article-body p, .article__text p".to_string(),
            title_selector: "h1".to_string(),
            author_selector: ".author, .article__author, [rel=author], meta[name=author]"
                .to_string(),
            date_selector:
                "meta[property='article:published_time'], time, .date, .article__date".to_string(),
            topics_selector: ".tags a, .article__tags a, a[rel=tag]".to_string(),
        }
    }
}

/// Validated, immutable crawler settings.
#[derive(Debug, Clone)]
pub struct Config {
    seed_urls: Vec<String>,
    num_articles: usize,
    headers: BTreeMap<String, String>,
    encoding: String,
    timeout: Duration,
    verify_certificate: bool,
    headless_mode: bool,
    site: SiteRules,
    selectors: PageSelectors,
}

impl Config {
    /// Read and validate a configuration file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Validate a configuration held in a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Validate an already-parsed JSON document.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);

        let seed_urls = validate_seed_urls(obj.get("seed_urls"))?;
        let num_articles = validate_num_articles(obj.get("num_articles"))?;
        let headers = validate_headers(obj.get("headers"))?;
        let encoding = match obj.get("encoding") {
            Some(Value::String(s))
                if Encoding::for_label(s.trim().as_bytes()).is_some() =>
            {
                s.trim().to_string()
            }
            _ => return Err(ConfigError::InvalidEncoding),
        };
        let timeout = match obj.get("timeout").and_then(Value::as_u64) {
            Some(t) if t > 0 && t < TIMEOUT_MAX => Duration::from_secs(t),
            _ => return Err(ConfigError::InvalidTimeout),
        };
        let verify_certificate = match obj.get("should_verify_certificate") {
            Some(Value::Bool(b)) => *b,
            _ => return Err(ConfigError::InvalidVerifyFlag),
        };
        let headless_mode = match obj.get("headless_mode") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(ConfigError::InvalidHeadlessFlag),
        };
        let site = match obj.get("site") {
            None | Some(Value::Null) => SiteRules::default(),
            Some(v) => SiteRules::deserialize(v)
                .map_err(|e| ConfigError::InvalidSiteRules(e.to_string()))?,
        };
        let selectors = validate_site_rules(&site)?;

        debug!(
            seeds = seed_urls.len(),
            num_articles,
            %encoding,
            timeout_secs = timeout.as_secs(),
            verify_certificate,
            headless_mode,
            "Configuration validated"
        );

        Ok(Self {
            seed_urls,
            num_articles,
            headers,
            encoding,
            timeout,
            verify_certificate,
            headless_mode,
            site,
            selectors,
        })
    }

    pub fn seed_urls(&self) -> &[String] {
        &self.seed_urls
    }

    /// Maximum number of articles to collect in one run.
    pub fn num_articles(&self) -> usize {
        self.num_articles
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Label of the charset used to decode every response body.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn verify_certificate(&self) -> bool {
        self.verify_certificate
    }

    /// Carried for completeness; pages are never rendered with a browser.
    pub fn headless_mode(&self) -> bool {
        self.headless_mode
    }

    pub fn site(&self) -> &SiteRules {
        &self.site
    }

    /// Selectors compiled from [`SiteRules`] during validation.
    pub fn selectors(&self) -> &PageSelectors {
        &self.selectors
    }
}

fn validate_seed_urls(value: Option<&Value>) -> Result<Vec<String>, ConfigError> {
    let Some(Value::Array(items)) = value else {
        return Err(ConfigError::InvalidSeedURL);
    };
    if items.is_empty() {
        return Err(ConfigError::InvalidSeedURL);
    }
    items
        .iter()
        .map(|item| match item {
            Value::String(s) if SEED_URL_RE.is_match(s) && url::Url::parse(s).is_ok() => {
                Ok(s.clone())
            }
            _ => Err(ConfigError::InvalidSeedURL),
        })
        .collect()
}

fn validate_num_articles(value: Option<&Value>) -> Result<usize, ConfigError> {
    let Some(Value::Number(n)) = value else {
        return Err(ConfigError::InvalidArticleCountType);
    };
    let Some(n) = n.as_i64() else {
        // Floats, or integers beyond i64.
        return match n.as_u64() {
            Some(_) => Err(ConfigError::ArticleCountOutOfRange),
            None => Err(ConfigError::InvalidArticleCountType),
        };
    };
    if n < 1 || n as u64 > MAX_ARTICLES {
        return Err(ConfigError::ArticleCountOutOfRange);
    }
    Ok(n as usize)
}

fn validate_headers(value: Option<&Value>) -> Result<BTreeMap<String, String>, ConfigError> {
    let Some(Value::Object(map)) = value else {
        return Err(ConfigError::InvalidHeaders);
    };
    map.iter()
        .map(|(k, v)| match v {
            Value::String(s) => Ok((k.clone(), s.clone())),
            _ => Err(ConfigError::InvalidHeaders),
        })
        .collect()
}

fn validate_site_rules(site: &SiteRules) -> Result<PageSelectors, ConfigError> {
    if !site.article_path_prefix.starts_with('/') {
        return Err(ConfigError::InvalidSiteRules(
            "article_path_prefix must start with '/'".to_string(),
        ));
    }
    if site.min_path_segments == 0 {
        return Err(ConfigError::InvalidSiteRules(
            "min_path_segments must be at least 1".to_string(),
        ));
    }
    PageSelectors::compile(site).map_err(ConfigError::InvalidSiteRules)
}

/// Build a valid configuration for tests without going through a file.
#[cfg(test)]
pub(crate) fn test_config(seed_urls: &[&str], num_articles: usize) -> Config {
    let value = serde_json::json!({
        "seed_urls": seed_urls,
        "num_articles": num_articles,
        "headers": {"User-Agent": "news_crawler-test"},
        "encoding": "utf-8",
        "timeout": 5,
        "should_verify_certificate": true,
        "headless_mode": false
    });
    Config::from_value(&value).expect("test config must be valid")
}
