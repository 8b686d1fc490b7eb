//! Read-through access to the content cache.
//!
//! [`ContentCache`] owns the fail-open contract: a backend error on read is a
//! miss, a backend error on write or delete is logged and dropped, and an entry
//! that no longer decodes is discarded. None of these ever reach the caller.
//! Only the wrapped fetch can fail a read, and its error is passed through
//! untouched and never cached.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::{counter, histogram};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::store::{CacheStore, MemoryStore, StoreError};

const METRIC_CACHE_HIT_TOTAL: &str = "penlog_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "penlog_cache_miss_total";
const METRIC_CACHE_STORE_ERROR_TOTAL: &str = "penlog_cache_store_error_total";
const METRIC_CACHE_INVALIDATED_TOTAL: &str = "penlog_cache_invalidated_total";
const METRIC_CACHE_FETCH_MS: &str = "penlog_cache_fetch_ms";

/// Per-key gate. The flag is set once a fetched value failed to reach the
/// backend, after which waiters fetch without queueing.
type Gate = Arc<Mutex<bool>>;
type FlightGates = DashMap<String, Gate>;

/// Shared cache handle, created once at startup and passed to services.
pub struct ContentCache {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    /// Per-key gates for miss coalescing; `None` when coalescing is off.
    in_flight: Option<FlightGates>,
}

impl ContentCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            enabled: config.enabled,
            in_flight: config.coalesce_misses.then(DashMap::new),
        }
    }

    /// Cache backed by an in-process [`MemoryStore`] sized from `config`.
    pub fn in_memory(config: &CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::new(config.capacity_non_zero()));
        Self::new(store, config)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look `key` up. Any failure along the way is reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let namespace = key.namespace().to_string();
        let raw = match self.store.get(key.as_str()).await {
            Ok(raw) => raw,
            Err(err) => {
                record_store_error("get", key, &err);
                None
            }
        };

        let Some(raw) = raw else {
            counter!(METRIC_CACHE_MISS_TOTAL, "namespace" => namespace).increment(1);
            debug!(%key, "Cache miss");
            return None;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT_TOTAL, "namespace" => namespace).increment(1);
                debug!(%key, "Cache hit");
                Some(value)
            }
            Err(err) => {
                warn!(%key, error = %err, "Discarding cache entry that no longer decodes");
                self.del(key).await;
                counter!(METRIC_CACHE_MISS_TOTAL, "namespace" => namespace).increment(1);
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl`. Best effort.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        if self.enabled {
            self.store_value(key, value, ttl).await;
        }
    }

    /// Returns whether the entry reached the backend.
    async fn store_value<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "Skipping cache write for unserializable value");
                return false;
            }
        };

        match self.store.set(key.as_str(), raw, ttl).await {
            Ok(()) => true,
            Err(err) => {
                record_store_error("set", key, &err);
                false
            }
        }
    }

    /// Remove a single entry. Best effort.
    pub async fn del(&self, key: &CacheKey) {
        if !self.enabled {
            return;
        }

        if let Err(err) = self.store.del(key.as_str()).await {
            record_store_error("del", key, &err);
        }
    }

    /// Remove every entry matching the glob `pattern`, returning how many were
    /// removed. A backend failure removes nothing and reports zero.
    pub async fn del_pattern(&self, pattern: &str) -> usize {
        if !self.enabled {
            return 0;
        }

        match self.store.del_pattern(pattern).await {
            Ok(removed) => {
                counter!(METRIC_CACHE_INVALIDATED_TOTAL).increment(removed as u64);
                debug!(pattern, removed, "Invalidated cache pattern");
                removed
            }
            Err(err) => {
                counter!(METRIC_CACHE_STORE_ERROR_TOTAL, "op" => "del_pattern").increment(1);
                warn!(pattern, error = %err, "Cache pattern invalidation failed; entries expire by TTL");
                0
            }
        }
    }

    /// Drop everything.
    pub async fn clear(&self) -> usize {
        let removed = self.del_pattern("*").await;
        info!(removed, "Cleared content cache");
        removed
    }

    /// Return the cached value for `key`, or run `fetch`, cache its result for
    /// `ttl` and return it.
    ///
    /// A hit never runs `fetch`. An `Err` from `fetch` is returned as is and
    /// leaves the cache untouched. Without coalescing, concurrent misses on one
    /// key each run their own fetch; with it, they wait for the first one and
    /// re-read the cache. Once a fetched value fails to reach the backend, the
    /// callers still waiting on that key stop queueing and fetch in parallel.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return fetch().await;
        }

        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }

        let Some(flights) = &self.in_flight else {
            return self
                .fetch_and_store(&key, ttl, fetch)
                .await
                .map(|(value, _)| value);
        };

        let flight = Flight::join(flights, key.as_str());
        let mut bypass = flight.gate().lock().await;
        if *bypass {
            drop(bypass);
            return self
                .fetch_and_store(&key, ttl, fetch)
                .await
                .map(|(value, _)| value);
        }

        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }

        let (value, stored) = self.fetch_and_store(&key, ttl, fetch).await?;
        if !stored {
            *bypass = true;
        }
        Ok(value)
    }

    async fn fetch_and_store<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<(T, bool), E>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started_at = Instant::now();
        let value = fetch().await?;
        histogram!(METRIC_CACHE_FETCH_MS, "namespace" => key.namespace().to_string())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        let stored = self.store_value(key, &value, ttl).await;
        Ok((value, stored))
    }
}

/// A caller's stake in the per-key gate. Dropping it, on completion or on
/// cancellation, removes the gate once no other caller holds it.
struct Flight<'a> {
    flights: &'a FlightGates,
    key: &'a str,
    gate: Option<Gate>,
}

impl<'a> Flight<'a> {
    fn join(flights: &'a FlightGates, key: &'a str) -> Self {
        let gate = Arc::clone(&*flights.entry(key.to_string()).or_default());
        Self {
            flights,
            key,
            gate: Some(gate),
        }
    }

    fn gate(&self) -> &Mutex<bool> {
        match &self.gate {
            Some(gate) => gate,
            None => unreachable!("gate is only taken on drop"),
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        drop(self.gate.take());
        self.flights
            .remove_if(self.key, |_, gate| Arc::strong_count(gate) == 1);
    }
}

fn record_store_error(op: &'static str, key: &CacheKey, err: &StoreError) {
    counter!(METRIC_CACHE_STORE_ERROR_TOTAL, "op" => op).increment(1);
    warn!(op, %key, error = %err, "Cache backend failed; continuing without cache");
}
