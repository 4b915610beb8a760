//! Core types for novel-dl

use serde::{Deserialize, Serialize};

/// Outcome of validating one chapter's content
///
/// `is_valid` is true exactly when `errors` is empty; construct through
/// [`ValidationVerdict::from_findings`] to keep that invariant. Deserializing
/// recomputes `is_valid` from `errors`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VerdictFindings")]
pub struct ValidationVerdict {
    /// Whether the content may be saved
    pub is_valid: bool,
    /// Independent reasons the content is invalid
    pub errors: Vec<String>,
    /// Quality concerns that do not affect validity
    pub warnings: Vec<String>,
}

impl ValidationVerdict {
    /// Build a verdict from collected errors and warnings
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

impl Default for ValidationVerdict {
    fn default() -> Self {
        Self::from_findings(Vec::new(), Vec::new())
    }
}

/// Serialized verdict fields that validity is derived from
#[derive(Deserialize)]
struct VerdictFindings {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl From<VerdictFindings> for ValidationVerdict {
    fn from(findings: VerdictFindings) -> Self {
        Self::from_findings(findings.errors, findings.warnings)
    }
}

/// One outcome per requested chapter
///
/// Exactly one of `content` and `error` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterResult {
    /// Chapter number this result describes
    pub chapter_number: u32,
    /// Normalized chapter content, present on success
    pub content: Option<String>,
    /// Verdict of the last validation run, if validation ran at all
    pub validation: Option<ValidationVerdict>,
    /// Terminal failure reason, present on failure
    pub error: Option<String>,
}

impl ChapterResult {
    /// Successful fetch, extraction and validation
    pub fn success(chapter_number: u32, content: String, validation: ValidationVerdict) -> Self {
        Self {
            chapter_number,
            content: Some(content),
            validation: Some(validation),
            error: None,
        }
    }

    /// Terminal failure
    pub fn failure(
        chapter_number: u32,
        error: impl Into<String>,
        validation: Option<ValidationVerdict>,
    ) -> Self {
        Self {
            chapter_number,
            content: None,
            validation,
            error: Some(error.into()),
        }
    }

    /// Returns true if content was retrieved and validated
    pub fn is_success(&self) -> bool {
        self.content.is_some()
    }
}

/// A chapter extracted from a raw page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedChapter {
    /// Chapter number the page was requested for
    pub chapter_number: u32,
    /// Chapter heading text
    pub title: String,
    /// Body paragraphs in page order
    pub paragraphs: Vec<String>,
    /// Normalized markup: `<h1>` heading followed by one `<p>` per paragraph
    pub content: String,
}

/// One novel in a trending listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Novel title
    pub title: String,
    /// Link to the novel page
    pub url: String,
}

/// One novel in a search result page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Novel title
    pub title: String,
    /// Link to the novel page
    pub url: String,
    /// Short excerpt shown by the site
    pub description: String,
}

/// Running completion count reported to progress callbacks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Chapters finished so far (success or failure)
    pub completed: usize,
    /// Chapters requested in total
    pub total: usize,
}

impl Progress {
    /// Completion as a percentage in `[0, 100]`
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f32 / self.total as f32) * 100.0
        }
    }
}

/// Events published by the download orchestrator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A range download started
    DownloadStarted {
        /// Normalized book identifier
        book: String,
        /// First chapter of the range
        start: u32,
        /// Last chapter of the range
        end: u32,
    },
    /// A chapter attempt failed and will be retried
    ChapterRetrying {
        /// Chapter number
        chapter: u32,
        /// One-based number of the attempt that failed
        attempt: u32,
        /// Why the attempt failed
        reason: String,
    },
    /// A chapter was fetched and validated
    ChapterDownloaded {
        /// Chapter number
        chapter: u32,
    },
    /// A chapter failed terminally
    ChapterFailed {
        /// Chapter number
        chapter: u32,
        /// Terminal failure reason
        error: String,
    },
    /// All chapters of the range have a result
    DownloadComplete {
        /// Normalized book identifier
        book: String,
        /// Chapters that succeeded
        succeeded: usize,
        /// Chapters that failed
        failed: usize,
    },
}
