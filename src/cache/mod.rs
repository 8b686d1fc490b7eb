//! Penlog content cache.
//!
//! A TTL-keyed read-through cache in front of the blog data source:
//!
//! - **Keys**: `namespace:arg:arg` strings built with [`cache_key!`](crate::cache_key)
//! - **Store**: [`CacheStore`] backends; [`MemoryStore`] is LRU-bounded with lazy expiry
//! - **Read-through**: [`ContentCache::get_or_fetch`], failing open on backend errors
//! - **Invalidation**: [`Invalidator`] drops whole namespaces after writes
//! - **TTL policy**: [`TtlPolicy`] per [`ResourceKind`]
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1000
//! coalesce_misses = false
//!
//! [cache.ttl]
//! posts = 60
//! search_results = 30
//! # ... see config.rs for all options
//! ```

mod clock;
mod config;
mod invalidation;
mod keys;
mod lock;
mod pattern;
mod policy;
mod read_through;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use invalidation::{InvalidationPlan, Invalidator, Mutation};
pub use keys::{CacheKey, KEY_DELIMITER, Namespace};
pub use pattern::glob_match;
pub use policy::{ResourceKind, TtlPolicy};
pub use read_through::ContentCache;
pub use store::{CacheStore, MemoryStore, StoreError};
