//! Data models for crawled articles.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Article`]: a fully extracted article, immutable once built
//! - [`ArticleBuilder`]: accumulates fields during extraction and yields an [`Article`]
//! - [`ArticleMeta`]: the serialized metadata record written next to the raw text
//! - [`ExtractionFailure`]: why a single article could not be extracted

use crate::dates::format_canonical;
use crate::fetcher::FetchError;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single extracted news article.
///
/// Fields are private; an `Article` only comes out of [`ArticleBuilder::build`]
/// and is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    id: usize,
    url: String,
    text: String,
    title: String,
    author: Option<String>,
    publication_date: Option<DateTime<Utc>>,
    topics: Vec<String>,
}

impl Article {
    /// 1-based position of the article in discovery order.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Paragraphs joined by `\n`; empty when the page had no paragraph content.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn publication_date(&self) -> Option<DateTime<Utc>> {
        self.publication_date
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Metadata record in its serializable form.
    pub fn meta(&self) -> ArticleMeta {
        ArticleMeta {
            id: self.id,
            url: self.url.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            date: self.publication_date.as_ref().map(format_canonical),
            topics: self.topics.clone(),
        }
    }
}

/// Builder used by the extractor while it walks an article page.
#[derive(Debug, Default)]
pub struct ArticleBuilder {
    id: usize,
    url: String,
    paragraphs: Vec<String>,
    title: Option<String>,
    author: Option<String>,
    publication_date: Option<DateTime<Utc>>,
    topics: Vec<String>,
}

impl ArticleBuilder {
    pub fn new(id: usize, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn paragraphs<I, S>(mut self, paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paragraphs.extend(paragraphs.into_iter().map(Into::into));
        self
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn publication_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.publication_date = date;
        self
    }

    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    /// Finish the article.
    ///
    /// Blank paragraphs are dropped, text is whitespace-normalized, topics are
    /// trimmed and deduplicated in order, and a missing title becomes `""`.
    pub fn build(self) -> Article {
        let text = self
            .paragraphs
            .iter()
            .map(|p| normalize_whitespace(p))
            .filter(|p| !p.is_empty())
            .join("\n");
        let topics = self
            .topics
            .iter()
            .map(|t| normalize_whitespace(t))
            .filter(|t| !t.is_empty())
            .unique()
            .collect();

        Article {
            id: self.id,
            url: self.url,
            text,
            title: self.title.map(|t| normalize_whitespace(&t)).unwrap_or_default(),
            author: self
                .author
                .map(|a| normalize_whitespace(&a))
                .filter(|a| !a.is_empty()),
            publication_date: self.publication_date,
            topics,
        }
    }
}

/// Serialized metadata for one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMeta {
    pub id: usize,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    /// Canonical RFC 3339 timestamp in UTC.
    pub date: Option<String>,
    pub topics: Vec<String>,
}

/// An article that could not be extracted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to extract {url}: {cause}")]
pub struct ExtractionFailure {
    pub url: String,
    pub id: usize,
    #[source]
    pub cause: ExtractionCause,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionCause {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The page had neither a title nor any paragraph text.
    #[error("no content found")]
    NoContent,
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builder_joins_paragraphs_with_newline() {
        let article = ArticleBuilder::new(1, "https://example.com/news/1/a")
            .paragraphs(["First  paragraph.", "  ", "Second\nparagraph."])
            .title(Some(" Headline ".to_string()))
            .build();
        assert_eq!(article.text(), "First paragraph.\nSecond paragraph.");
        assert_eq!(article.title(), "Headline");
        assert_eq!(article.id(), 1);
    }

    #[test]
    fn test_builder_defaults_are_soft() {
        let article = ArticleBuilder::new(4, "https://example.com/news/4/d")
            .author(Some("   ".to_string()))
            .build();
        assert_eq!(article.text(), "");
        assert_eq!(article.title(), "");
        assert_eq!(article.author(), None);
        assert_eq!(article.publication_date(), None);
        assert!(article.topics().is_empty());
    }

    #[test]
    fn test_builder_dedups_topics_in_order() {
        let article = ArticleBuilder::new(2, "u")
            .topics(["Politics", " Economy ", "Politics", ""])
            .build();
        assert_eq!(article.topics(), &["Politics".to_string(), "Economy".to_string()]);
    }

    #[test]
    fn test_meta_serialization() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap();
        let article = ArticleBuilder::new(3, "https://example.com/news/3/c")
            .title(Some("Title".to_string()))
            .author(Some("Jane Roe".to_string()))
            .publication_date(Some(date))
            .topics(["World"])
            .build();

        let meta = article.meta();
        assert_eq!(meta.date.as_deref(), Some("2024-03-05T12:30:00Z"));

        let json = serde_json::to_string(&meta).unwrap();
        let back: ArticleMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
        assert!(json.contains("\"author\":\"Jane Roe\""));
    }

    #[test]
    fn test_extraction_failure_display() {
        let failure = ExtractionFailure {
            url: "https://example.com/news/9/x".to_string(),
            id: 9,
            cause: FetchError::NonSuccessStatus(500).into(),
        };
        assert_eq!(
            failure.to_string(),
            "failed to extract https://example.com/news/9/x: non-success status 500"
        );

        let empty = ExtractionFailure {
            url: "u".to_string(),
            id: 1,
            cause: ExtractionCause::NoContent,
        };
        assert_eq!(empty.to_string(), "failed to extract u: no content found");
    }
}
