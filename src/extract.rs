//! Content extraction from raw pages
//!
//! [`ContentExtractor`] turns a fetched page into structured data. The worker
//! only depends on the trait; [`HtmlExtractor`] is the implementation for the
//! supported novel sites.

use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::types::{ListingEntry, ParsedChapter, SearchResult};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TITLE_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("h2, h3").ok());
static PARAGRAPH_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("p").ok());
static NOVEL_LINK_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("h3.truyen-title a").ok());
static ROW_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("div.row").ok());
static EXCERPT_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("div.excerpt").ok());

/// Parses raw pages into chapters, listings and search results
pub trait ContentExtractor: Send + Sync {
    /// Extract one chapter, or `None` if the page holds no chapter text
    fn extract_chapter(&self, raw: &str, chapter_number: u32) -> Option<ParsedChapter>;

    /// Extract the novels of a trending listing page, in page order
    fn extract_listing(&self, raw: &str) -> Vec<ListingEntry>;

    /// Extract the novels of a search result page, in page order
    fn extract_search_results(&self, raw: &str) -> Vec<SearchResult>;
}

/// HTML extractor for novelfull-style pages
#[derive(Clone, Debug)]
pub struct HtmlExtractor {
    container: Selector,
}

impl HtmlExtractor {
    /// Extractor reading chapter text from `div#<content_id>`
    pub fn new(content_id: &str) -> Result<Self> {
        let container = Selector::parse(&format!("div#{content_id}")).map_err(|e| {
            Error::config(
                format!("invalid chapter content id '{content_id}': {e:?}"),
                "sites.content_id",
            )
        })?;
        Ok(Self { container })
    }

    /// Extractor for the configured content id
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        Self::new(&config.content_id)
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract_chapter(&self, raw: &str, chapter_number: u32) -> Option<ParsedChapter> {
        let title_selector = TITLE_SELECTOR.as_ref()?;
        let paragraph_selector = PARAGRAPH_SELECTOR.as_ref()?;

        let document = Html::parse_document(raw);
        let container = document.select(&self.container).next()?;

        let title = container
            .select(title_selector)
            .map(element_text)
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| format!("Chapter {chapter_number}"));

        let paragraphs: Vec<String> = container
            .select(paragraph_selector)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect();
        if paragraphs.is_empty() {
            tracing::debug!(chapter = chapter_number, "Chapter container has no paragraphs");
            return None;
        }

        let content = normalize(&title, &paragraphs);
        Some(ParsedChapter {
            chapter_number,
            title,
            paragraphs,
            content,
        })
    }

    fn extract_listing(&self, raw: &str) -> Vec<ListingEntry> {
        let Some(link_selector) = NOVEL_LINK_SELECTOR.as_ref() else {
            return Vec::new();
        };

        let document = Html::parse_document(raw);
        document
            .select(link_selector)
            .filter_map(|link| {
                let title = link_title(link);
                let url = link.value().attr("href")?.trim().to_string();
                (!title.is_empty() && !url.is_empty()).then_some(ListingEntry { title, url })
            })
            .collect()
    }

    fn extract_search_results(&self, raw: &str) -> Vec<SearchResult> {
        let (Some(row_selector), Some(link_selector), Some(excerpt_selector)) = (
            ROW_SELECTOR.as_ref(),
            NOVEL_LINK_SELECTOR.as_ref(),
            EXCERPT_SELECTOR.as_ref(),
        ) else {
            return Vec::new();
        };

        let document = Html::parse_document(raw);
        document
            .select(row_selector)
            .filter_map(|row| {
                let link = row.select(link_selector).next()?;
                let excerpt = row.select(excerpt_selector).next()?;
                let title = link_title(link);
                let url = link.value().attr("href")?.trim().to_string();
                if title.is_empty() || url.is_empty() {
                    return None;
                }
                Some(SearchResult {
                    title,
                    url,
                    description: element_text(excerpt),
                })
            })
            .collect()
    }
}

/// Normalized chapter markup: one `h1` heading, then one `p` per paragraph
fn normalize(title: &str, paragraphs: &[String]) -> String {
    let mut content = format!("<h1>{}</h1>", html_escape::encode_text(title));
    for paragraph in paragraphs {
        content.push_str("\n<p>");
        content.push_str(&html_escape::encode_text(paragraph));
        content.push_str("</p>");
    }
    content
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// Sites put the full name in `title` and may truncate the link text
fn link_title(link: ElementRef<'_>) -> String {
    link.value()
        .attr("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| element_text(link))
}
