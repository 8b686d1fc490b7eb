//! Cache configuration.
//!
//! Controls the content cache via the `[cache]` section of `penlog.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

use super::policy::TtlPolicy;

const DEFAULT_CAPACITY: usize = 1000;

/// Cache configuration from `penlog.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Route reads through the cache at all.
    pub enabled: bool,
    /// Maximum entries held by the in-memory store.
    pub capacity: usize,
    /// Let concurrent misses on one key share a single fetch. Waiters queue
    /// behind the fetching caller; if its value cannot be stored they fetch in
    /// parallel.
    pub coalesce_misses: bool,
    /// Populate common entries before serving the first command.
    pub warm_on_startup: bool,
    #[serde(skip)]
    pub ttl: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            coalesce_misses: false,
            warm_on_startup: false,
            ttl: TtlPolicy::default(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            coalesce_misses: settings.coalesce_misses,
            warm_on_startup: settings.warm_on_startup,
            ttl: TtlPolicy::from(&settings.ttl),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
