//! Single-chapter fetch worker
//!
//! [`ChapterFetcher::fetch_one`] fetches, extracts and validates one chapter,
//! retrying with exponential backoff until the content validates or the
//! attempts run out. Empty pages, pages without chapter text and pages that
//! fail validation are all retried: sites often answer an error page with a
//! success status.
//!
//! The worker never errors. Every call ends in exactly one [`ChapterResult`].

use crate::config::RetryConfig;
use crate::extract::ContentExtractor;
use crate::retry::backoff_delay;
use crate::source::ContentSource;
use crate::types::{ChapterResult, Event, ValidationVerdict};
use crate::url_template::ChapterUrlTemplate;
use crate::validator::ContentValidator;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Fetches and validates chapters with retry
pub struct ChapterFetcher {
    source: Arc<dyn ContentSource>,
    extractor: Arc<dyn ContentExtractor>,
    validator: ContentValidator,
    retry: RetryConfig,
    event_tx: Option<broadcast::Sender<Event>>,
}

/// Why one attempt did not produce valid content
struct AttemptFailure {
    reason: String,
    validation: Option<ValidationVerdict>,
}

impl AttemptFailure {
    fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            validation: None,
        }
    }
}

impl ChapterFetcher {
    /// Create a worker over the given collaborators
    pub fn new(
        source: Arc<dyn ContentSource>,
        extractor: Arc<dyn ContentExtractor>,
        validator: ContentValidator,
        retry: RetryConfig,
    ) -> Self {
        Self {
            source,
            extractor,
            validator,
            retry,
            event_tx: None,
        }
    }

    /// Publish [`Event::ChapterRetrying`] on `event_tx` for every retried attempt
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Retry policy in use
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch one chapter, retrying until it validates or attempts are exhausted
    pub async fn fetch_one(&self, template: &ChapterUrlTemplate, chapter_number: u32) -> ChapterResult {
        let url = template.render(chapter_number);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_reason = String::new();
        let mut last_validation = None;

        for attempt in 0..max_attempts {
            match self.attempt(&url, chapter_number).await {
                Ok((content, verdict)) => {
                    tracing::debug!(
                        chapter = chapter_number,
                        attempts = attempt + 1,
                        warnings = verdict.warnings.len(),
                        "Chapter fetched"
                    );
                    return ChapterResult::success(chapter_number, content, verdict);
                }
                Err(failure) => {
                    if failure.validation.is_some() {
                        last_validation = failure.validation;
                    }
                    last_reason = failure.reason;
                }
            }

            if attempt + 1 < max_attempts {
                let delay = backoff_delay(&self.retry, attempt);
                tracing::warn!(
                    chapter = chapter_number,
                    attempt = attempt + 1,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    reason = %last_reason,
                    "Chapter attempt failed, retrying"
                );
                if let Some(tx) = &self.event_tx {
                    tx.send(Event::ChapterRetrying {
                        chapter: chapter_number,
                        attempt: attempt + 1,
                        reason: last_reason.clone(),
                    })
                    .ok();
                }
                tokio::time::sleep(delay).await;
            }
        }

        let error = format!("failed after {max_attempts} attempts: {last_reason}");
        tracing::error!(chapter = chapter_number, url = %url, error = %error, "Chapter failed");
        ChapterResult::failure(chapter_number, error, last_validation)
    }

    async fn attempt(
        &self,
        url: &str,
        chapter_number: u32,
    ) -> Result<(String, ValidationVerdict), AttemptFailure> {
        let raw = match self.source.fetch(url).await {
            Some(raw) if !raw.trim().is_empty() => raw,
            Some(_) => return Err(AttemptFailure::transient("empty response")),
            None => return Err(AttemptFailure::transient("fetch failed")),
        };

        let Some(chapter) = self.extractor.extract_chapter(&raw, chapter_number) else {
            return Err(AttemptFailure::transient("no chapter content found"));
        };

        let verdict = self.validator.validate(&chapter.content, chapter_number);
        if verdict.is_valid {
            Ok((chapter.content, verdict))
        } else {
            Err(AttemptFailure {
                reason: format!("invalid content: {}", verdict.errors.join("; ")),
                validation: Some(verdict),
            })
        }
    }
}
