//! Chapter range download orchestrator.
//!
//! [`ChapterDownloader::download_range`] splits a chapter range into chunks
//! processed one after another. Inside a chunk every chapter runs as its own
//! task, at most `max_workers` at a time. Each chapter yields exactly one
//! [`ChapterResult`]; a worker that panics is reported as a failed chapter.
//! Results come back sorted by chapter number.

mod chunking;
mod progress;

#[cfg(test)]
mod tests;

pub use progress::ProgressCallback;

use crate::types::{ChapterResult, Event};
use crate::url_template::ChapterUrlTemplate;
use crate::worker::ChapterFetcher;
use chunking::chunk_ranges;
use futures::stream::{self, StreamExt};
use progress::{ProgressReporter, ProgressTicker, REPORTER_STOP_TIMEOUT};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Runs chapter workers over a range with bounded concurrency
pub struct ChapterDownloader {
    fetcher: Arc<ChapterFetcher>,
    event_tx: broadcast::Sender<Event>,
}

impl ChapterDownloader {
    /// Orchestrator over `fetcher`; its retries are published on this orchestrator's events
    pub fn new(fetcher: ChapterFetcher) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            fetcher: Arc::new(fetcher.with_events(event_tx.clone())),
            event_tx,
        }
    }

    /// Subscribe to download events
    ///
    /// Receivers that lag or are dropped never affect downloads.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Download chapters `start..=end` of `book`
    ///
    /// Returns one result per chapter, sorted by chapter number. An inverted
    /// range returns no results. `on_progress` receives a running count as
    /// chapters finish, from a reporter task that is stopped before this
    /// returns.
    #[allow(clippy::too_many_arguments)]
    pub async fn download_range(
        &self,
        book: &str,
        template: &ChapterUrlTemplate,
        start: u32,
        end: u32,
        chunk_size: usize,
        max_workers: usize,
        on_progress: Option<ProgressCallback>,
    ) -> Vec<ChapterResult> {
        if start > end {
            tracing::warn!(book = %book, start, end, "Empty chapter range, nothing to download");
            return Vec::new();
        }

        let total = usize::try_from(end - start)
            .unwrap_or(usize::MAX)
            .saturating_add(1);
        tracing::info!(
            book = %book,
            start,
            end,
            chunks = total.div_ceil(chunk_size.max(1)),
            max_workers,
            "Starting chapter download"
        );
        self.event_tx
            .send(Event::DownloadStarted {
                book: book.to_string(),
                start,
                end,
            })
            .ok();

        let reporter = ProgressReporter::spawn(total, on_progress);
        let template = Arc::new(template.clone());
        let mut results = Vec::new();
        for chunk in chunk_ranges(start, end, chunk_size) {
            tracing::debug!(book = %book, first = chunk.start(), last = chunk.end(), "Dispatching chunk");
            let chunk_results = self
                .download_chunk(chunk, &template, max_workers, reporter.ticker())
                .await;
            results.extend(chunk_results);
        }
        reporter.stop(REPORTER_STOP_TIMEOUT).await;

        results.sort_by_key(|r| r.chapter_number);

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - succeeded;
        tracing::info!(book = %book, succeeded, failed, "Chapter download finished");
        self.event_tx
            .send(Event::DownloadComplete {
                book: book.to_string(),
                succeeded,
                failed,
            })
            .ok();

        results
    }

    /// Run one chunk with at most `max_workers` chapters in flight
    async fn download_chunk(
        &self,
        chapters: RangeInclusive<u32>,
        template: &Arc<ChapterUrlTemplate>,
        max_workers: usize,
        ticker: ProgressTicker,
    ) -> Vec<ChapterResult> {
        stream::iter(chapters)
            .map(|chapter| {
                let fetcher = Arc::clone(&self.fetcher);
                let template = Arc::clone(template);
                let event_tx = self.event_tx.clone();
                let ticker = ticker.clone();

                async move {
                    let worker =
                        tokio::spawn(async move { fetcher.fetch_one(&template, chapter).await });
                    let result = match worker.await {
                        Ok(result) => result,
                        Err(e) => {
                            tracing::error!(chapter, error = %e, "Chapter worker panicked");
                            ChapterResult::failure(
                                chapter,
                                format!("unexpected worker fault: {e}"),
                                None,
                            )
                        }
                    };
                    ticker.tick();
                    publish_outcome(&event_tx, &result);
                    result
                }
            })
            .buffer_unordered(max_workers.max(1))
            .collect()
            .await
    }
}

fn publish_outcome(event_tx: &broadcast::Sender<Event>, result: &ChapterResult) {
    let event = match &result.error {
        None => Event::ChapterDownloaded {
            chapter: result.chapter_number,
        },
        Some(error) => Event::ChapterFailed {
            chapter: result.chapter_number,
            error: error.clone(),
        },
    };
    event_tx.send(event).ok();
}
