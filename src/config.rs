//! Configuration types for novel-dl
//!
//! Every field has a serde default, so an empty document deserializes to
//! [`Config::default()`]. Locating and parsing a configuration file is left to
//! the embedding application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a scraping session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output location and worker-pool sizing
    #[serde(default)]
    pub download: DownloadConfig,

    /// Chapter-level retry policy (semantic and transport failures)
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP fetch settings for the content source
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Content validation thresholds
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Memoization cache for search and listing pages
    #[serde(default)]
    pub cache: CacheConfig,

    /// URL templates and page structure of the source sites
    #[serde(default)]
    pub sites: SiteConfig,
}

impl Config {
    /// Output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }
}

/// Download behavior configuration (output directory, concurrency, chunking)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Base directory for books, chapters and the listing file (default: "./novels")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum chapters fetched concurrently within a chunk (default: 5)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Maximum chapters per chunk; chunks run one after another (default: 10)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Last chapter requested when the caller gives no end (default: 50)
    #[serde(default = "default_end_chapter")]
    pub default_end_chapter: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_workers: default_max_workers(),
            chunk_size: default_chunk_size(),
            default_end_chapter: default_end_chapter(),
        }
    }
}

/// Retry configuration for exponential backoff
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Upper bound of the random jitter (default: 100 milliseconds)
    #[serde(default = "default_max_jitter", with = "millis_serde")]
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
            max_jitter: default_max_jitter(),
        }
    }
}

/// HTTP fetch configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Transport-level attempts per request for retryable statuses (default: 3)
    #[serde(default = "default_max_attempts")]
    pub transport_attempts: u32,

    /// Status codes retried at the transport level (default: 500, 502, 503, 504)
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            transport_attempts: default_max_attempts(),
            retry_statuses: default_retry_statuses(),
            user_agent: default_user_agent(),
        }
    }
}

/// Content validation thresholds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Content shorter than this many characters is invalid (default: 500)
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Content longer than this many characters gets a warning (default: 50000)
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Case-insensitive phrases that mark an error page
    #[serde(default = "default_error_indicators")]
    pub error_indicators: Vec<String>,

    /// Paragraphs at least this long are checked for repetition (default: 50)
    #[serde(default = "default_repeated_segment_min_len")]
    pub repeated_segment_min_len: usize,

    /// Paragraphs shorter than this count as short (default: 20)
    #[serde(default = "default_short_segment_len")]
    pub short_segment_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            error_indicators: default_error_indicators(),
            repeated_segment_min_len: default_repeated_segment_min_len(),
            short_segment_len: default_short_segment_len(),
        }
    }
}

/// Cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live of cached entries (default: 1 hour)
    #[serde(default = "default_cache_ttl", with = "duration_serde")]
    pub ttl: Duration,

    /// Directory for on-disk entries; entries stay in memory when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            dir: None,
        }
    }
}

/// Source site configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Named URL templates (`{book_name}`, `{chapter_number}`, `{search_term}`, `{page}`)
    #[serde(default = "default_templates")]
    pub templates: BTreeMap<String, String>,

    /// Template used for chapter URLs when no site is named (default: "novelfull")
    #[serde(default = "default_site")]
    pub default_site: String,

    /// `id` of the element holding chapter text (default: "chapter-content")
    #[serde(default = "default_content_id")]
    pub content_id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            default_site: default_site(),
            content_id: default_content_id(),
        }
    }
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("novels")
}

fn default_max_workers() -> usize {
    5
}

fn default_chunk_size() -> usize {
    10
}

fn default_end_chapter() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_jitter() -> Duration {
    Duration::from_millis(100)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_retry_statuses() -> Vec<u16> {
    vec![500, 502, 503, 504]
}

fn default_user_agent() -> String {
    format!("novel-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_min_length() -> usize {
    500
}

fn default_max_length() -> usize {
    50_000
}

fn default_error_indicators() -> Vec<String> {
    vec![
        "404 not found".to_string(),
        "page not found".to_string(),
        "chapter not available".to_string(),
        "access denied".to_string(),
    ]
}

fn default_repeated_segment_min_len() -> usize {
    50
}

fn default_short_segment_len() -> usize {
    20
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_templates() -> BTreeMap<String, String> {
    [
        (
            "novelfull",
            "https://novelfull.com/{book_name}/chapter-{chapter_number}.html",
        ),
        (
            "novelusb",
            "https://novelusb.com/novel-book/{book_name}/chapter-{chapter_number}",
        ),
        ("search", "https://novelfull.net/search?keyword={search_term}"),
        ("hot_novels", "https://novelfull.net/hot-novel?page={page}"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_site() -> String {
    "novelfull".to_string()
}

fn default_content_id() -> String {
    "chapter-content".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
