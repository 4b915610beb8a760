//! Books and the library of known books
//!
//! The [`Library`] is a plain value owned by the caller. Session operations
//! that change it take `&mut Library`; nothing in the download pipeline keeps
//! a shared copy.

use crate::types::ListingEntry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Normalized identifier for a book name: trimmed, lowercase, words joined by `-`
///
/// Path separators split words like whitespace does, and words made only of
/// dots are dropped, so the identifier is always a single file name.
pub fn normalize_book_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || matches!(c, '/' | '\\'))
        .filter(|word| !word.chars().all(|c| c == '.'))
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// A novel known to the library
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Display title
    pub title: String,
    /// Directory holding chapter files and the combined book
    pub folder_path: PathBuf,
    /// Chapters saved so far, ascending; `None` until a download ran
    #[serde(default)]
    pub chapters: Option<Vec<u32>>,
    /// Short description from the source site
    #[serde(default)]
    pub description: Option<String>,
    /// Author name
    #[serde(default)]
    pub author: Option<String>,
    /// Link to the novel page on the source site
    #[serde(default)]
    pub url: Option<String>,
}

impl Book {
    /// New book stored under `base_dir/<formatted title>`
    pub fn new(title: impl Into<String>, base_dir: &Path) -> Self {
        let title = title.into();
        let folder_path = base_dir.join(normalize_book_name(&title));
        Self {
            title,
            folder_path,
            chapters: None,
            description: None,
            author: None,
            url: None,
        }
    }

    /// Book for a trending-listing entry
    pub fn from_listing(entry: &ListingEntry, base_dir: &Path) -> Self {
        Self {
            url: Some(entry.url.clone()),
            ..Self::new(entry.title.clone(), base_dir)
        }
    }

    /// Title as used in URLs and file names
    pub fn formatted_title(&self) -> String {
        normalize_book_name(&self.title)
    }

    /// Location of the combined book file
    pub fn html_path(&self) -> PathBuf {
        self.folder_path
            .join(format!("{}.html", self.formatted_title()))
    }

    /// Merge newly saved chapters into the recorded list, keeping it sorted and unique
    pub fn record_chapters(&mut self, saved: impl IntoIterator<Item = u32>) {
        let chapters = self.chapters.get_or_insert_with(Vec::new);
        chapters.extend(saved);
        chapters.sort_unstable();
        chapters.dedup();
    }

    /// Number of chapters saved so far
    pub fn chapter_count(&self) -> usize {
        self.chapters.as_ref().map_or(0, Vec::len)
    }
}

/// The caller-owned list of known books
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Library {
    books: Vec<Book>,
}

impl Library {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding `books`
    pub fn from_books(books: Vec<Book>) -> Self {
        Self { books }
    }

    /// All books, in library order
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Number of books
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Returns true if the library has no books
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Book whose normalized title matches `name`
    pub fn find(&self, name: &str) -> Option<&Book> {
        let id = normalize_book_name(name);
        self.books.iter().find(|b| b.formatted_title() == id)
    }

    /// Book matching `name`, added under `base_dir` if missing
    pub fn find_or_insert(&mut self, name: &str, base_dir: &Path) -> &mut Book {
        let id = normalize_book_name(name);
        let index = match self.books.iter().position(|b| b.formatted_title() == id) {
            Some(index) => index,
            None => {
                tracing::debug!(book = %id, "Adding book to library");
                self.books.push(Book::new(name.trim(), base_dir));
                self.books.len() - 1
            }
        };
        &mut self.books[index]
    }

    /// Replace all books
    pub fn replace(&mut self, books: Vec<Book>) {
        self.books = books;
    }

    /// Sort alphabetically by title, ignoring case
    pub fn sort_by_name(&mut self) {
        self.books
            .sort_by_cached_key(|b| b.title.to_lowercase());
    }

    /// Sort by saved chapter count, most first
    pub fn sort_by_chapter_count(&mut self) {
        self.books
            .sort_by_key(|b| std::cmp::Reverse(b.chapter_count()));
    }
}
