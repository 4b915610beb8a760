//! # novel-dl
//!
//! Backend library for downloading web-novel chapters.
//!
//! ## Design Philosophy
//!
//! novel-dl is designed to be:
//! - **Robust against bad pages** - Chapters are validated, and error pages served
//!   with a success status are retried like network failures
//! - **Concurrent but bounded** - Chapter ranges run in chunks on a bounded worker pool
//! - **Failure as data** - A batch always returns one result per chapter
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use novel_dl::{Config, NovelScraper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scraper = NovelScraper::new(Config::default())?;
//!     let mut library = scraper.load_library().await?;
//!
//!     // Subscribe to events
//!     let mut events = scraper.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = scraper
//!         .download_book(&mut library, "Martial Peak", 1, Some(20), None)
//!         .await?;
//!     println!("{} saved, {} failed", report.succeeded(), report.failed());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Time-limited memoization cache
pub mod cache;
/// Configuration types
pub mod config;
/// Chapter range orchestration and progress reporting
pub mod downloader;
/// Error types
pub mod error;
/// Page content extraction
pub mod extract;
/// Books and the library listing
pub mod library;
/// Retry logic with exponential backoff
pub mod retry;
/// Scraping session facade
pub mod session;
/// Content sources
pub mod source;
/// Chapter and listing storage
pub mod storage;
/// Core types
pub mod types;
/// URL templates
pub mod url_template;
/// Chapter content validation
pub mod validator;
/// Single-chapter fetch worker
pub mod worker;

// Re-export commonly used types
pub use cache::{Cache, Clock, ManualClock, SystemClock};
pub use config::{
    CacheConfig, Config, DownloadConfig, FetchConfig, RetryConfig, SiteConfig, ValidationConfig,
};
pub use downloader::{ChapterDownloader, ProgressCallback};
pub use error::{Error, Result, StorageError};
pub use extract::{ContentExtractor, HtmlExtractor};
pub use library::{Book, Library};
pub use session::{BookDownload, NovelScraper};
pub use source::{ContentSource, HttpSource};
pub use storage::{BookStore, FileStore};
pub use types::{
    ChapterResult, Event, ListingEntry, ParsedChapter, Progress, SearchResult, ValidationVerdict,
};
pub use url_template::{ChapterUrlTemplate, UrlTemplates};
pub use validator::ContentValidator;
pub use worker::ChapterFetcher;
