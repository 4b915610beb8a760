//! Scraping session
//!
//! [`NovelScraper`] wires the content source, extractor, store, cache and
//! download orchestrator together for one session. Read-only lookups (search,
//! trending listing) are memoized; chapter downloads always go to the source
//! and the store.

use crate::cache::Cache;
use crate::config::Config;
use crate::downloader::{ChapterDownloader, ProgressCallback};
use crate::error::{Error, Result};
use crate::extract::{ContentExtractor, HtmlExtractor};
use crate::library::{Book, Library, normalize_book_name};
use crate::source::{ContentSource, HttpSource};
use crate::storage::{BookStore, FileStore};
use crate::types::{ChapterResult, Event, ListingEntry, SearchResult};
use crate::url_template::UrlTemplates;
use crate::validator::ContentValidator;
use crate::worker::ChapterFetcher;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Listing pages walked before giving up on finding the end
const MAX_LISTING_PAGES: u32 = 100;

/// Outcome of [`NovelScraper::download_book`]
#[derive(Clone, Debug)]
pub struct BookDownload {
    /// One result per requested chapter, sorted by chapter number
    pub results: Vec<ChapterResult>,
    /// Combined book file, if any chapter was saved
    pub output: Option<PathBuf>,
}

impl BookDownload {
    /// Chapters saved successfully
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Chapters that failed
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// One scraping session over a configured site
pub struct NovelScraper {
    config: Config,
    templates: UrlTemplates,
    source: Arc<dyn ContentSource>,
    extractor: Arc<dyn ContentExtractor>,
    store: Arc<dyn BookStore>,
    cache: Cache,
    downloader: ChapterDownloader,
}

impl NovelScraper {
    /// Session using HTTP, HTML extraction and file storage under `config.download.output_dir`
    ///
    /// # Errors
    /// Returns error if the HTTP client, extractor or cache cannot be created
    pub fn new(config: Config) -> Result<Self> {
        let source = Arc::new(HttpSource::new(&config.fetch, &config.retry)?);
        let extractor = Arc::new(HtmlExtractor::from_config(&config.sites)?);
        let store = Arc::new(FileStore::new(config.output_dir().clone()));
        let cache = Cache::from_config(&config.cache)?;
        Ok(Self::with_parts(config, source, extractor, store, cache))
    }

    /// Session over explicit collaborators
    pub fn with_parts(
        config: Config,
        source: Arc<dyn ContentSource>,
        extractor: Arc<dyn ContentExtractor>,
        store: Arc<dyn BookStore>,
        cache: Cache,
    ) -> Self {
        let fetcher = ChapterFetcher::new(
            Arc::clone(&source),
            Arc::clone(&extractor),
            ContentValidator::new(config.validation.clone()),
            config.retry.clone(),
        );
        Self {
            templates: UrlTemplates::new(&config.sites),
            config,
            source,
            extractor,
            store,
            cache,
            downloader: ChapterDownloader::new(fetcher),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// URL templates, e.g. to merge custom ones
    pub fn templates_mut(&mut self) -> &mut UrlTemplates {
        &mut self.templates
    }

    /// Memoization cache for lookups
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Subscribe to download events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.downloader.subscribe()
    }

    /// Load the saved library listing
    pub async fn load_library(&self) -> Result<Library> {
        Ok(Library::from_books(self.store.load_listing().await?))
    }

    /// Search the site, memoized per query and search page URL
    ///
    /// An unavailable search page yields no results and is not cached.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let url = self.templates.search_url(query)?;
        let key = (query, url.clone());
        let outcome = self
            .cache
            .memoize("search", &key, || async move {
                let raw = self
                    .source
                    .fetch(&url)
                    .await
                    .ok_or_else(|| Error::NotFound(format!("search page {url}")))?;
                Ok(self.extractor.extract_search_results(&raw))
            })
            .await;

        match outcome {
            Err(Error::NotFound(what)) => {
                tracing::warn!(query = %query, page = %what, "Search page unavailable");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Refresh `library` from the trending listing, memoized per listing URL
    ///
    /// Walks listing pages from 1 until a page is unavailable, empty, or
    /// repeats the previous one. The library is replaced by the listed books,
    /// keeping chapters already recorded for books it knew, and saved.
    pub async fn hot_novels(&self, library: &mut Library) -> Result<Vec<ListingEntry>> {
        let first_page = self.templates.hot_novels_url(1)?;
        let outcome = self
            .cache
            .memoize("hot_novels", first_page.as_str(), || self.walk_listing())
            .await;
        let entries = match outcome {
            Ok(entries) => entries,
            Err(Error::NotFound(what)) => {
                tracing::warn!(page = %what, "Trending listing unavailable, library unchanged");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let base = self.config.output_dir();
        let books = entries
            .iter()
            .map(|entry| {
                let mut book = Book::from_listing(entry, base);
                if let Some(known) = library.find(&entry.title) {
                    book.chapters = known.chapters.clone();
                }
                book
            })
            .collect();
        library.replace(books);
        self.store.save_listing(library.books()).await?;

        tracing::info!(novels = entries.len(), "Trending listing refreshed");
        Ok(entries)
    }

    async fn walk_listing(&self) -> Result<Vec<ListingEntry>> {
        let mut entries = Vec::new();
        let mut previous: Vec<ListingEntry> = Vec::new();

        for page in 1..=MAX_LISTING_PAGES {
            let url = self.templates.hot_novels_url(page)?;
            let Some(raw) = self.source.fetch(&url).await else {
                if page == 1 {
                    return Err(Error::NotFound(format!("listing page {url}")));
                }
                break;
            };

            let novels = self.extractor.extract_listing(&raw);
            if novels.is_empty() || novels == previous {
                tracing::debug!(page, "End of trending listing");
                break;
            }
            entries.extend(novels.iter().cloned());
            previous = novels;
        }

        Ok(entries)
    }

    /// Download chapters `start..=end` of `name` and combine the saved ones
    ///
    /// `end` defaults to `download.default_end_chapter`. Every valid chapter is
    /// saved and recorded on the book, adding the book to `library` if needed.
    /// The listing is then written back and the saved chapters are merged into
    /// the book's combined file. When nothing is saved, `library` is left
    /// untouched. Chapter failures are reported in the returned results, not
    /// as an error.
    ///
    /// # Errors
    /// Returns error for an empty book name, a bad chapter template, or when
    /// the listing cannot be saved
    pub async fn download_book(
        &self,
        library: &mut Library,
        name: &str,
        start: u32,
        end: Option<u32>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<BookDownload> {
        let book_id = normalize_book_name(name);
        if book_id.is_empty() {
            return Err(Error::Other("book name is empty".to_string()));
        }
        let end = end.unwrap_or(self.config.download.default_end_chapter);
        let template = self.templates.chapter_template(&book_id, None)?;

        let results = self
            .downloader
            .download_range(
                &book_id,
                &template,
                start,
                end,
                self.config.download.chunk_size,
                self.config.download.max_workers,
                on_progress,
            )
            .await;

        let mut saved = Vec::new();
        for result in &results {
            let Some(content) = &result.content else {
                continue;
            };
            match self
                .store
                .save_unit(&book_id, result.chapter_number, content)
                .await
            {
                Ok(_) => saved.push(result.chapter_number),
                Err(e) => {
                    tracing::error!(book = %book_id, chapter = result.chapter_number, error = %e, "Failed to save chapter");
                }
            }
        }

        if saved.is_empty() {
            tracing::warn!(book = %book_id, start, end, "No chapters saved");
            return Ok(BookDownload {
                results,
                output: None,
            });
        }

        let book = library.find_or_insert(name, self.config.output_dir());
        book.record_chapters(saved);
        // Also sweeps chapter files left behind by an earlier failed combine
        let recorded = book.chapters.as_deref().unwrap_or_default();
        let (first, last) = match (recorded.first(), recorded.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => (start, end),
        };
        self.store.save_listing(library.books()).await?;

        let output = match self.store.combine_units(&book_id, first, last).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::error!(book = %book_id, error = %e, "Failed to combine chapters");
                None
            }
        };

        Ok(BookDownload { results, output })
    }
}
