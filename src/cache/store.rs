//! Cache storage backends.
//!
//! [`CacheStore`] is the seam between the read-through layer and whatever
//! holds the entries. Values cross it as serialized JSON so a remote backend
//! can implement the same trait. [`MemoryStore`] is the in-process backend:
//! LRU-bounded, with per-entry TTL checked lazily on read.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::lock::{rw_read, rw_write};
use super::pattern::{glob_match, literal_prefix};

const SOURCE: &str = "cache::store";
const METRIC_CACHE_EVICT_TOTAL: &str = "penlog_cache_evict_total";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache backend timed out")]
    Timeout,
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Key-value storage with per-entry expiry.
///
/// Implementations must make each single-key operation atomic; no ordering or
/// atomicity is promised across keys, and `del_pattern` may interleave with a
/// concurrent `set` of a matching key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored value, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` until `ttl` has elapsed, replacing any previous entry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Removes `key`. Absent keys are not an error.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Removes every key matching the glob `pattern`, returning how many went.
    async fn del_pattern(&self, pattern: &str) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: String,
    expires_at: OffsetDateTime,
}

impl StoredEntry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// In-process store.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, StoredEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry now instead of waiting for a read to find it.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "purge_expired");
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    fn expiry(&self, ttl: Duration) -> OffsetDateTime {
        let now = self.clock.now();
        time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        match entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }

        entries.pop(key);
        debug!(key, "Purged expired cache entry");
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let entry = StoredEntry {
            value,
            expires_at: self.expiry(ttl),
        };

        let evicted = rw_write(&self.entries, SOURCE, "set").push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
                debug!(key = %evicted_key, "Evicted least recently used cache entry");
            }
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "del").pop(key);
        Ok(())
    }

    async fn del_pattern(&self, pattern: &str) -> Result<usize, StoreError> {
        let prefix = literal_prefix(pattern);
        let mut entries = rw_write(&self.entries, SOURCE, "del_pattern");
        let matched: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matched {
            entries.pop(key);
        }
        Ok(matched.len())
    }
}
