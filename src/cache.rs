//! Time-limited memoization cache for idempotent reads
//!
//! Search pages and trending listings are cached under a key derived from the
//! operation name and its arguments. Entries older than the configured
//! time-to-live are treated as absent and removed when next read; there is no
//! background sweep.
//!
//! The chapter download path never goes through this cache: its results are
//! persisted by [`BookStore`](crate::storage::BookStore), and a cache hit must
//! not skip those writes.

use crate::config::CacheConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// File extension of on-disk cache entries
const ENTRY_EXTENSION: &str = "cache";

/// Source of the current time for expiry checks
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for simulating elapsed time
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(delta) = chrono::Duration::from_std(by)
            && let Some(next) = now.checked_add_signed(delta)
        {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A stored value with its write time
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key the entry was stored under
    pub key: String,
    /// Serialized value
    pub value: serde_json::Value,
    /// When the entry was written
    pub stored_at: DateTime<Utc>,
}

enum Backend {
    Memory(Mutex<HashMap<String, CacheEntry>>),
    Disk(PathBuf),
}

/// Key-addressed store with a time-to-live
pub struct Cache {
    backend: Backend,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            Backend::Memory(_) => "memory".to_string(),
            Backend::Disk(dir) => dir.display().to_string(),
        };
        f.debug_struct("Cache")
            .field("backend", &backend)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Cache {
    /// Cache that keeps entries in process memory
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(HashMap::new())),
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    /// Cache that keeps one file per entry in `dir`, creating it if needed
    pub fn on_disk(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            backend: Backend::Disk(dir),
            ttl,
            clock: Arc::new(SystemClock),
        })
    }

    /// Build the backend selected by `config`
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        match &config.dir {
            Some(dir) => Self::on_disk(dir, config.ttl),
            None => Ok(Self::in_memory(config.ttl)),
        }
    }

    /// Replace the clock used for expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Deterministic key for an operation and its arguments
    ///
    /// `name:` followed by the SHA-256 of the JSON-serialized arguments.
    pub fn key_for<A: Serialize + ?Sized>(name: &str, args: &A) -> Result<String> {
        let encoded = serde_json::to_vec(args)?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(format!("{}:{:x}", name, hasher.finalize()))
    }

    /// Read a live entry, removing it if it has expired
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = match &self.backend {
            Backend::Memory(entries) => {
                let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
                let entry = entries.get(key)?.clone();
                if self.is_expired(&entry) {
                    entries.remove(key);
                    tracing::debug!(key, "Cache entry expired");
                    return None;
                }
                entry
            }
            Backend::Disk(dir) => {
                let path = entry_path(dir, key);
                let entry = read_entry(&path)?;
                if entry.key != key {
                    return None;
                }
                if self.is_expired(&entry) {
                    if let Err(e) = std::fs::remove_file(&path) {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to remove expired cache entry");
                    }
                    tracing::debug!(key, "Cache entry expired");
                    return None;
                }
                entry
            }
        };

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cached value has unexpected shape, ignoring");
                None
            }
        }
    }

    /// Store a value, replacing any previous entry under the same key
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            value: serde_json::to_value(value)?,
            stored_at: self.clock.now(),
        };

        match &self.backend {
            Backend::Memory(entries) => {
                entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key.to_string(), entry);
            }
            Backend::Disk(dir) => {
                let path = entry_path(dir, key);
                let tmp = path.with_extension("tmp");
                std::fs::write(&tmp, serde_json::to_vec(&entry)?)?;
                std::fs::rename(&tmp, &path)?;
            }
        }
        Ok(())
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        match &self.backend {
            Backend::Memory(entries) => {
                entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
            }
            Backend::Disk(dir) => {
                for dir_entry in std::fs::read_dir(dir)? {
                    let path = dir_entry?.path();
                    if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                        std::fs::remove_file(&path)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Return the cached result of `name(args)`, running `producer` on a miss
    ///
    /// Only successful results are stored. A failure to store is logged and the
    /// freshly produced value is still returned.
    pub async fn memoize<T, A, F, Fut>(&self, name: &str, args: &A, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = Self::key_for(name, args)?;
        if let Some(hit) = self.get(&key) {
            tracing::debug!(operation = name, "Cache hit");
            return Ok(hit);
        }

        let value = producer().await?;
        if let Err(e) = self.set(&key, &value) {
            tracing::warn!(operation = name, error = %e, "Failed to store cache entry");
        }
        Ok(value)
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        let age = self.clock.now().signed_duration_since(entry.stored_at);
        // Entries from the future (clock moved back) count as fresh
        age.to_std().is_ok_and(|age| age > self.ttl)
    }
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    dir.join(format!("{:x}.{}", hasher.finalize(), ENTRY_EXTENSION))
}

fn read_entry(path: &Path) -> Option<CacheEntry> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read cache entry");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt cache entry, ignoring");
            None
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc::now()))
    }

    #[test]
    fn set_then_get_returns_value() {
        let cache = Cache::in_memory(TTL);
        cache.set("search:dragon", &vec!["a", "b"]).unwrap();

        let hit: Option<Vec<String>> = cache.get("search:dragon");
        assert_eq!(hit, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn missing_key_is_absent() {
        let cache = Cache::in_memory(TTL);
        assert_eq!(cache.get::<String>("nope"), None);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let clock = manual_clock();
        let cache = Cache::in_memory(TTL).with_clock(clock.clone());
        cache.set("k", &1u32).unwrap();

        clock.advance(TTL);
        assert_eq!(cache.get::<u32>("k"), Some(1), "age equal to ttl is still live");

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get::<u32>("k"), None);

        cache.set("k", &2u32).unwrap();
        assert_eq!(cache.get::<u32>("k"), Some(2));
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let cache = Cache::in_memory(TTL);
        cache.set("k", "first").unwrap();
        cache.set("k", "second").unwrap();

        assert_eq!(cache.get::<String>("k").as_deref(), Some("second"));
    }

    #[test]
    fn clear_removes_everything() {
        let cache = Cache::in_memory(TTL);
        cache.set("a", &1).unwrap();
        cache.set("b", &2).unwrap();
        cache.clear().unwrap();

        assert_eq!(cache.get::<i32>("a"), None);
        assert_eq!(cache.get::<i32>("b"), None);
    }

    #[test]
    fn disk_cache_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        Cache::on_disk(dir.path(), TTL)
            .unwrap()
            .set("hot_novels:1", &vec!["Martial Peak"])
            .unwrap();

        let reopened = Cache::on_disk(dir.path(), TTL).unwrap();
        let hit: Option<Vec<String>> = reopened.get("hot_novels:1");
        assert_eq!(hit, Some(vec!["Martial Peak".to_string()]));
    }

    #[test]
    fn disk_cache_deletes_expired_file_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let clock = manual_clock();
        let cache = Cache::on_disk(dir.path(), TTL)
            .unwrap()
            .with_clock(clock.clone());
        cache.set("k", &"v").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        clock.advance(TTL + Duration::from_secs(1));
        assert_eq!(cache.get::<String>("k"), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn disk_clear_only_touches_cache_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let cache = Cache::on_disk(dir.path(), TTL).unwrap();
        cache.set("k", &1).unwrap();

        cache.clear().unwrap();

        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(cache.get::<i32>("k"), None);
    }

    #[test]
    fn corrupt_disk_entry_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::on_disk(dir.path(), TTL).unwrap();
        std::fs::write(entry_path(dir.path(), "k"), b"not json").unwrap();

        assert_eq!(cache.get::<i32>("k"), None);
    }

    #[test]
    fn key_is_stable_and_argument_sensitive() {
        let a = Cache::key_for("search", &("dragon",)).unwrap();
        let b = Cache::key_for("search", &("dragon",)).unwrap();
        let c = Cache::key_for("search", &("phoenix",)).unwrap();
        let d = Cache::key_for("hot_novels", &("dragon",)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.starts_with("search:"));
    }

    #[tokio::test]
    async fn memoize_runs_producer_once_within_ttl() {
        let cache = Cache::in_memory(TTL);
        let calls = AtomicU32::new(0);
        let calls = &calls;

        for _ in 0..2 {
            let value: Vec<String> = cache
                .memoize("search", "dragon", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["Dragon King".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["Dragon King".to_string()]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memoize_reruns_after_expiry() {
        let clock = manual_clock();
        let cache = Cache::in_memory(TTL).with_clock(clock.clone());
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let producer = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7u32)
        };

        cache.memoize("hot", &1u32, producer).await.unwrap();
        clock.advance(TTL * 2);
        cache.memoize("hot", &1u32, producer).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn memoize_does_not_store_failures() {
        let cache = Cache::in_memory(TTL);
        let first: Result<u32> = cache
            .memoize("search", "x", || async {
                Err(crate::error::Error::Other("offline".to_string()))
            })
            .await;
        assert!(first.is_err());

        let second = cache
            .memoize("search", "x", || async { Ok(3u32) })
            .await
            .unwrap();
        assert_eq!(second, 3);
    }
}
