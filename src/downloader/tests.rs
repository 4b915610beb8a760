// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::config::{RetryConfig, ValidationConfig};
use crate::extract::HtmlExtractor;
use crate::source::ContentSource;
use crate::types::Progress;
use crate::validator::ContentValidator;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Fake novel site keyed by the chapter number in the URL
#[derive(Default)]
struct FakeSite {
    invalid: HashSet<u32>,
    panics: HashSet<u32>,
    delay: Duration,
    calls: Mutex<HashMap<u32, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    log: Mutex<Vec<(&'static str, u32)>>,
}

impl FakeSite {
    fn calls_for(&self, chapter: u32) -> u32 {
        self.calls.lock().unwrap().get(&chapter).copied().unwrap_or(0)
    }

    fn log(&self) -> Vec<(&'static str, u32)> {
        self.log.lock().unwrap().clone()
    }
}

fn chapter_from_url(url: &str) -> u32 {
    url.rsplit('-')
        .next()
        .and_then(|tail| tail.trim_end_matches(".html").parse().ok())
        .unwrap()
}

#[async_trait]
impl ContentSource for FakeSite {
    async fn fetch(&self, url: &str) -> Option<String> {
        let chapter = chapter_from_url(url);
        *self.calls.lock().unwrap().entry(chapter).or_default() += 1;
        self.log.lock().unwrap().push(("start", chapter));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Vary latency so completion order differs from dispatch order
        tokio::time::sleep(self.delay * (3 - chapter % 3)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(("finish", chapter));

        if self.panics.contains(&chapter) {
            panic!("parser bug on chapter {chapter}");
        }
        if self.invalid.contains(&chapter) {
            return Some(
                r#"<div id="chapter-content"><h2>Error</h2><p>Chapter not available.</p></div>"#
                    .to_string(),
            );
        }
        Some(format!(
            r#"<div id="chapter-content"><h2>Chapter {chapter}</h2><p>Text of chapter {chapter}.</p></div>"#
        ))
    }
}

fn downloader(site: Arc<FakeSite>, max_attempts: u32) -> ChapterDownloader {
    let fetcher = ChapterFetcher::new(
        site,
        Arc::new(HtmlExtractor::new("chapter-content").unwrap()),
        ContentValidator::new(ValidationConfig {
            min_length: 10,
            ..ValidationConfig::default()
        }),
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: true,
            max_jitter: Duration::from_millis(2),
        },
    );
    ChapterDownloader::new(fetcher)
}

fn template() -> ChapterUrlTemplate {
    ChapterUrlTemplate::new("https://novels.test/book/chapter-{chapter_number}.html").unwrap()
}

fn site() -> FakeSite {
    FakeSite {
        delay: Duration::from_millis(2),
        ..FakeSite::default()
    }
}

#[tokio::test]
async fn one_result_per_chapter_sorted() {
    let site = Arc::new(site());
    let results = downloader(site, 3)
        .download_range("book", &template(), 4, 26, 5, 3, None)
        .await;

    let numbers: Vec<u32> = results.iter().map(|r| r.chapter_number).collect();
    assert_eq!(numbers, (4..=26).collect::<Vec<_>>());
    assert!(results.iter().all(ChapterResult::is_success));
}

#[tokio::test]
async fn invalid_chapter_fails_without_affecting_siblings() {
    let site = Arc::new(FakeSite {
        invalid: HashSet::from([3]),
        ..site()
    });
    let results = downloader(Arc::clone(&site), 3)
        .download_range("book", &template(), 1, 5, 10, 5, None)
        .await;

    assert_eq!(results.len(), 5);
    for result in &results {
        if result.chapter_number == 3 {
            assert!(result.content.is_none());
            assert!(result.error.as_deref().is_some_and(|e| !e.is_empty()));
            assert!(result.validation.as_ref().is_some_and(|v| !v.is_valid));
        } else {
            assert!(result.content.is_some(), "chapter {} failed", result.chapter_number);
            assert!(result.error.is_none());
        }
    }
}

#[tokio::test]
async fn always_invalid_chapter_uses_exactly_max_attempts() {
    let site = Arc::new(FakeSite {
        invalid: HashSet::from([2]),
        ..site()
    });
    downloader(Arc::clone(&site), 4)
        .download_range("book", &template(), 1, 3, 10, 2, None)
        .await;

    assert_eq!(site.calls_for(2), 4);
    assert_eq!(site.calls_for(1), 1);
    assert_eq!(site.calls_for(3), 1);
}

#[tokio::test]
async fn concurrency_is_bounded_by_max_workers() {
    let site = Arc::new(FakeSite {
        delay: Duration::from_millis(5),
        ..FakeSite::default()
    });
    downloader(Arc::clone(&site), 1)
        .download_range("book", &template(), 1, 12, 12, 3, None)
        .await;

    let peak = site.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak}");
    assert!(peak > 1, "chapters should overlap, peak {peak}");
}

#[tokio::test]
async fn chunks_run_one_after_another() {
    let site = Arc::new(site());
    downloader(Arc::clone(&site), 1)
        .download_range("book", &template(), 1, 6, 3, 3, None)
        .await;

    let log = site.log();
    let last_finish_of_first_chunk = log
        .iter()
        .rposition(|&(kind, ch)| kind == "finish" && ch <= 3)
        .unwrap();
    let first_start_of_second_chunk = log
        .iter()
        .position(|&(kind, ch)| kind == "start" && ch >= 4)
        .unwrap();
    assert!(
        last_finish_of_first_chunk < first_start_of_second_chunk,
        "log: {log:?}"
    );
}

#[tokio::test]
async fn worker_panic_becomes_failure_result() {
    let site = Arc::new(FakeSite {
        panics: HashSet::from([2]),
        ..site()
    });
    let results = downloader(site, 3)
        .download_range("book", &template(), 1, 3, 10, 3, None)
        .await;

    assert_eq!(results.len(), 3);
    let faulted = &results[1];
    assert_eq!(faulted.chapter_number, 2);
    assert!(faulted.content.is_none());
    assert!(
        faulted
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("unexpected worker fault")),
        "got {:?}",
        faulted.error
    );
    assert!(results[0].is_success());
    assert!(results[2].is_success());
}

#[tokio::test]
async fn progress_reaches_total_and_stops_with_the_call() {
    let seen = Arc::new(Mutex::new(Vec::<Progress>::new()));
    let sink = Arc::clone(&seen);
    let on_progress: ProgressCallback = Arc::new(move |p: Progress| sink.lock().unwrap().push(p));

    let site = Arc::new(FakeSite {
        invalid: HashSet::from([5]),
        ..site()
    });
    downloader(site, 2)
        .download_range("book", &template(), 1, 8, 3, 4, Some(on_progress))
        .await;

    let calls_at_return = seen.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), calls_at_return, "reporter kept running");
    assert_eq!(seen.len(), 8);
    assert_eq!(seen.last().copied(), Some(Progress { completed: 8, total: 8 }));
}

#[tokio::test]
async fn inverted_range_returns_nothing() {
    let site = Arc::new(site());
    let results = downloader(Arc::clone(&site), 3)
        .download_range("book", &template(), 9, 3, 10, 5, None)
        .await;

    assert!(results.is_empty());
    assert!(site.log().is_empty());
}

#[tokio::test]
async fn events_bracket_the_download() {
    let site = Arc::new(FakeSite {
        invalid: HashSet::from([2]),
        ..site()
    });
    let downloader = downloader(site, 2);
    let mut events = downloader.subscribe();

    downloader
        .download_range("book", &template(), 1, 3, 10, 3, None)
        .await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert_eq!(
        received.first(),
        Some(&Event::DownloadStarted {
            book: "book".to_string(),
            start: 1,
            end: 3,
        })
    );
    assert_eq!(
        received.last(),
        Some(&Event::DownloadComplete {
            book: "book".to_string(),
            succeeded: 2,
            failed: 1,
        })
    );
    assert!(received.iter().any(|e| matches!(e, Event::ChapterRetrying { chapter: 2, .. })));
    assert!(received.iter().any(|e| matches!(e, Event::ChapterFailed { chapter: 2, .. })));
    assert_eq!(
        received
            .iter()
            .filter(|e| matches!(e, Event::ChapterDownloaded { .. }))
            .count(),
        2
    );
}
