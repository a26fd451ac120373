//! Article page parsing.
//!
//! Page access goes through the narrow [`PageDocument`] capability so the
//! crawler and extractor never touch the HTML tree directly. [`HtmlPage`] is
//! the `scraper` implementation.

use crate::config::SiteRules;
use crate::dates::unify_date_format;
use crate::fetcher::Fetch;
use crate::models::{Article, ArticleBuilder, ExtractionCause, ExtractionFailure};
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

/// What the crawler and extractor need from a parsed page.
pub trait PageDocument {
    /// Text of every paragraph-level element, in document order.
    fn paragraphs(&self) -> Vec<String>;
    fn title(&self) -> Option<String>;
    fn author(&self) -> Option<String>;
    /// Raw, unnormalized publication date.
    fn date(&self) -> Option<String>;
    fn topics(&self) -> Vec<String>;
    /// `href` of every hyperlink, in document order.
    fn links(&self) -> Vec<String>;
}

/// Compiled CSS selectors for one target site.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    paragraph: Selector,
    title: Selector,
    author: Selector,
    date: Selector,
    topics: Selector,
    any_paragraph: Selector,
    title_fallback: Selector,
    link: Selector,
}

impl PageSelectors {
    pub fn compile(rules: &SiteRules) -> Result<Self, String> {
        Ok(Self {
            paragraph: parse_selector("paragraph_selector", &rules.paragraph_selector)?,
            title: parse_selector("title_selector", &rules.title_selector)?,
            author: parse_selector("author_selector", &rules.author_selector)?,
            date: parse_selector("date_selector", &rules.date_selector)?,
            topics: parse_selector("topics_selector", &rules.topics_selector)?,
            any_paragraph: parse_selector("paragraph", "p")?,
            title_fallback: parse_selector("title", "meta[property='og:title'], title")?,
            link: parse_selector("link", "a[href]")?,
        })
    }
}

fn parse_selector(name: &str, css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("{name} {css:?}: {e}"))
}

/// A parsed HTML page.
pub struct HtmlPage<'a> {
    document: Html,
    selectors: &'a PageSelectors,
}

impl<'a> HtmlPage<'a> {
    pub fn parse(html: &str, selectors: &'a PageSelectors) -> Self {
        Self {
            document: Html::parse_document(html),
            selectors,
        }
    }

    fn first_value(&self, selector: &Selector) -> Option<String> {
        self.document
            .select(selector)
            .map(element_value)
            .find(|v| !v.is_empty())
    }
}

/// Text of an element, preferring the machine-readable attribute where the
/// element carries one (`<meta content>`, `<time datetime>`).
fn element_value(el: ElementRef<'_>) -> String {
    let value = el.value();
    let attr = match value.name() {
        "meta" => value.attr("content"),
        "time" => value.attr("datetime"),
        _ => None,
    };
    match attr {
        Some(a) => a.trim().to_string(),
        None => el.text().collect::<Vec<_>>().join(" ").trim().to_string(),
    }
}

impl PageDocument for HtmlPage<'_> {
    fn paragraphs(&self) -> Vec<String> {
        let collect = |sel: &Selector| -> Vec<String> {
            self.document
                .select(sel)
                .map(|el| el.text().flat_map(str::split_whitespace).join(" "))
                .filter(|t| !t.is_empty())
                .collect()
        };
        let found = collect(&self.selectors.paragraph);
        if found.is_empty() {
            collect(&self.selectors.any_paragraph)
        } else {
            found
        }
    }

    fn title(&self) -> Option<String> {
        self.first_value(&self.selectors.title)
            .or_else(|| self.first_value(&self.selectors.title_fallback))
    }

    fn author(&self) -> Option<String> {
        self.first_value(&self.selectors.author)
    }

    fn date(&self) -> Option<String> {
        self.first_value(&self.selectors.date)
    }

    fn topics(&self) -> Vec<String> {
        self.document
            .select(&self.selectors.topics)
            .map(element_value)
            .collect()
    }

    fn links(&self) -> Vec<String> {
        self.document
            .select(&self.selectors.link)
            .filter_map(|el| el.value().attr("href"))
            .map(|href| href.trim().to_string())
            .collect()
    }
}

/// Turn a parsed page into an [`Article`].
///
/// A missing or unparseable date leaves `publication_date` empty. Missing
/// text keeps whatever metadata was found; only a page yielding nothing at
/// all (no text, title, author, date or topics) is reported as a failure.
pub fn build_article(
    page: &impl PageDocument,
    id: usize,
    url: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Article, ExtractionFailure> {
    let raw_date = page.date();
    let publication_date = raw_date
        .as_deref()
        .and_then(|raw| unify_date_format(raw, fetched_at));
    if let (Some(raw), None) = (&raw_date, publication_date) {
        warn!(%url, raw_date = %truncate_for_log(raw, 80), "Unrecognized date format");
    }

    let article = ArticleBuilder::new(id, url)
        .paragraphs(page.paragraphs())
        .title(page.title())
        .author(page.author())
        .publication_date(publication_date)
        .topics(page.topics())
        .build();

    let has_metadata = !article.title().is_empty()
        || article.author().is_some()
        || raw_date.is_some()
        || !article.topics().is_empty();
    if article.text().is_empty() && !has_metadata {
        return Err(ExtractionFailure {
            url: url.to_string(),
            id,
            cause: ExtractionCause::NoContent,
        });
    }
    if article.text().is_empty() {
        warn!(%url, id, "No paragraph content; keeping metadata only");
    }
    Ok(article)
}

/// Fetches article pages and extracts them.
#[derive(Debug)]
pub struct Extractor<F> {
    fetcher: F,
    selectors: PageSelectors,
}

impl<F: Fetch> Extractor<F> {
    pub fn new(fetcher: F, selectors: PageSelectors) -> Self {
        Self { fetcher, selectors }
    }

    /// Fetch and parse a single article.
    #[instrument(level = "info", skip(self))]
    pub async fn extract(&self, url: &str, id: usize) -> Result<Article, ExtractionFailure> {
        let response = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| ExtractionFailure {
                url: url.to_string(),
                id,
                cause: e.into(),
            })?;
        let fetched_at = Utc::now();

        let page = HtmlPage::parse(&response.body, &self.selectors);
        let article = build_article(&page, id, url, fetched_at)?;
        info!(
            bytes = article.text().len(),
            has_date = article.publication_date().is_some(),
            topics = article.topics().len(),
            "Parsed article"
        );
        debug!(
            title = %truncate_for_log(article.title(), 120),
            author = ?article.author(),
            "Article metadata"
        );
        Ok(article)
    }
}
