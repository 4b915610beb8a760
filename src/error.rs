//! Error types for novel-dl
//!
//! Chapter-level failures are reported as data ([`ChapterResult`](crate::types::ChapterResult)),
//! never through this type. [`Error`] covers the operations around the download
//! pipeline: configuration, templates, HTTP transport, storage and the cache.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for novel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for novel-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sites.novelfull")
        key: Option<String>,
    },

    /// A URL template could not be rendered
    #[error("invalid URL template: {0}")]
    InvalidTemplate(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Requested item does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The per-book chapter directory does not exist
    #[error("chapter directory missing for book '{book}': {path}")]
    BookDirMissing {
        /// Normalized book identifier
        book: String,
        /// Directory that was expected
        path: PathBuf,
    },

    /// No saved chapter files exist in the requested range
    #[error("no saved chapters for book '{book}' in range {start}..={end}")]
    NothingToCombine {
        /// Normalized book identifier
        book: String,
        /// First chapter of the requested range
        start: u32,
        /// Last chapter of the requested range
        end: u32,
    },

    /// Book identifier is not a single plain file name
    #[error("invalid book id '{0}'")]
    InvalidBookId(String),

    /// Existing combined book is not in the layout this store writes
    #[error("combined book {path} has an unrecognized layout")]
    UnreadableBook {
        /// The combined book file
        path: PathBuf,
    },

    /// Writing a chapter file failed
    #[error("failed to write chapter {chapter} of '{book}': {source}")]
    WriteFailed {
        /// Normalized book identifier
        book: String,
        /// Chapter number being written
        chapter: u32,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
