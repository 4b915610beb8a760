//! Persistent storage for chapters, combined books and the library listing
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/books.json                       library listing
//! <base>/<book_id>/chapter_<n>.html       one saved chapter
//! <base>/<book_id>/<book_id>.html         combined book
//! ```
//!
//! The combined book tags every chapter with a `<!-- chapter N -->` marker, so
//! later downloads of the same book are merged into it instead of replacing it.

use crate::error::{Result, StorageError};
use crate::library::Book;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

const LISTING_FILE: &str = "books.json";

const DOCUMENT_HEAD: &str = "<html><body>\n";
const DOCUMENT_TAIL: &str = "\n</body></html>\n";
const CHAPTER_SEPARATOR: &str = "\n<hr>\n";
const MARKER_OPEN: &str = "<!-- chapter ";
const MARKER_CLOSE: &str = " -->\n";

/// Durable storage used by the scraping session
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Save one chapter's content, returning the written file
    async fn save_unit(&self, book_id: &str, chapter_number: u32, content: &str) -> Result<PathBuf>;

    /// Merge saved chapters in `start..=end` into the book's combined file
    ///
    /// Chapters already in the combined file are kept; a saved chapter
    /// replaces the combined copy with the same number. Chapters come out in
    /// ascending order. Per-chapter files that were combined are removed
    /// afterwards.
    async fn combine_units(&self, book_id: &str, start: u32, end: u32) -> Result<PathBuf>;

    /// Load the library listing; empty when none was saved yet
    async fn load_listing(&self) -> Result<Vec<Book>>;

    /// Replace the library listing
    async fn save_listing(&self, books: &[Book]) -> Result<()>;
}

/// Filesystem-backed store
#[derive(Clone, Debug)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Root directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory of one book's files
    pub fn book_dir(&self, book_id: &str) -> PathBuf {
        self.base_dir.join(book_id)
    }

    /// Path of one saved chapter
    pub fn unit_path(&self, book_id: &str, chapter_number: u32) -> PathBuf {
        self.book_dir(book_id)
            .join(format!("chapter_{chapter_number}.html"))
    }

    /// Path of the combined book
    pub fn combined_path(&self, book_id: &str) -> PathBuf {
        self.book_dir(book_id).join(format!("{book_id}.html"))
    }

    fn listing_path(&self) -> PathBuf {
        self.base_dir.join(LISTING_FILE)
    }

    /// Book directory, refusing ids that would leave the base directory
    fn checked_book_dir(&self, book_id: &str) -> Result<PathBuf> {
        let mut components = Path::new(book_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.book_dir(book_id)),
            _ => Err(StorageError::InvalidBookId(book_id.to_string()).into()),
        }
    }

    /// Chapters already in the combined book, empty when there is none
    async fn read_combined(&self, book_id: &str) -> Result<BTreeMap<u32, String>> {
        let path = self.combined_path(book_id);
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(document) => document,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        parse_combined(&document).ok_or_else(|| StorageError::UnreadableBook { path }.into())
    }
}

#[async_trait]
impl BookStore for FileStore {
    async fn save_unit(&self, book_id: &str, chapter_number: u32, content: &str) -> Result<PathBuf> {
        let dir = self.checked_book_dir(book_id)?;
        let path = self.unit_path(book_id, chapter_number);
        let write_failed = |source: std::io::Error| StorageError::WriteFailed {
            book: book_id.to_string(),
            chapter: chapter_number,
            source,
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(write_failed)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(write_failed)?;

        tracing::debug!(book = %book_id, chapter = chapter_number, path = %path.display(), "Saved chapter");
        Ok(path)
    }

    async fn combine_units(&self, book_id: &str, start: u32, end: u32) -> Result<PathBuf> {
        let dir = self.checked_book_dir(book_id)?;
        if !tokio::fs::try_exists(&dir).await? {
            return Err(StorageError::BookDirMissing {
                book: book_id.to_string(),
                path: dir,
            }
            .into());
        }

        let mut chapters = self.read_combined(book_id).await?;
        let previously_combined = chapters.len();

        let mut combined_files = Vec::new();
        for chapter in start..=end {
            let path = self.unit_path(book_id, chapter);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    chapters.insert(chapter, content);
                    combined_files.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if combined_files.is_empty() {
            return Err(StorageError::NothingToCombine {
                book: book_id.to_string(),
                start,
                end,
            }
            .into());
        }

        let output = self.combined_path(book_id);
        write_atomic(&output, render_combined(&chapters).as_bytes()).await?;

        for path in &combined_files {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove combined chapter file");
            }
        }

        tracing::info!(
            book = %book_id,
            added = combined_files.len(),
            kept = previously_combined,
            total = chapters.len(),
            path = %output.display(),
            "Combined chapters into book"
        );
        Ok(output)
    }

    async fn load_listing(&self) -> Result<Vec<Book>> {
        let path = self.listing_path();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&raw) {
            Ok(books) => Ok(books),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt book listing, starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn save_listing(&self, books: &[Book]) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let json = serde_json::to_vec_pretty(books)?;
        write_atomic(&self.listing_path(), &json).await
    }
}

fn render_combined(chapters: &BTreeMap<u32, String>) -> String {
    let parts: Vec<String> = chapters
        .iter()
        .map(|(number, content)| format!("{MARKER_OPEN}{number}{MARKER_CLOSE}{content}"))
        .collect();
    format!("{DOCUMENT_HEAD}{}{DOCUMENT_TAIL}", parts.join(CHAPTER_SEPARATOR))
}

/// Inverse of [`render_combined`]; `None` for any other layout
fn parse_combined(document: &str) -> Option<BTreeMap<u32, String>> {
    let body = document
        .strip_prefix(DOCUMENT_HEAD)?
        .strip_suffix(DOCUMENT_TAIL)?;

    let mut chapters = BTreeMap::new();
    if body.is_empty() {
        return Some(chapters);
    }
    for part in body.split(CHAPTER_SEPARATOR) {
        let (number, content) = part.strip_prefix(MARKER_OPEN)?.split_once(MARKER_CLOSE)?;
        chapters.insert(number.parse().ok()?, content.to_string());
    }
    Some(chapters)
}

/// Write through a sibling temp file and rename, so readers never see partial content
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
