mod support;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use penlog::application::blog::BlogService;
use penlog::application::repos::RepoError;
use penlog::application::warmer::{CacheWarmer, WarmReport};
use penlog::cache::{
    CacheConfig, CacheStore, ContentCache, ManualClock, MemoryStore, Mutation, Namespace,
    StoreError, TtlPolicy,
};
use penlog::cache_key;
use penlog::domain::query::SearchParams;

use support::InMemoryBlog;

struct Harness {
    source: Arc<InMemoryBlog>,
    cache: Arc<ContentCache>,
    clock: Arc<ManualClock>,
    service: BlogService,
}

fn harness_with(config: CacheConfig) -> Harness {
    let source = Arc::new(InMemoryBlog::seeded());
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(MemoryStore::with_clock(
        config.capacity_non_zero(),
        clock.clone(),
    ));
    let cache = Arc::new(ContentCache::new(store, &config));
    let service = BlogService::new(source.clone(), cache.clone(), config.ttl.clone());
    Harness {
        source,
        cache,
        clock,
        service,
    }
}

fn harness() -> Harness {
    harness_with(CacheConfig::default())
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let h = harness();

    let first = h.service.get_posts(None, 1, 10).await.expect("first read");
    let second = h.service.get_posts(None, 1, 10).await.expect("second read");

    assert_eq!(first, second);
    assert_eq!(first.total, 3);
    assert_eq!(h.source.calls("fetch_posts"), 1);
}

#[tokio::test]
async fn listing_is_cached_under_its_canonical_key() {
    let h = harness();

    h.service
        .get_posts(Some("rust"), 1, 10)
        .await
        .expect("listing");

    let cached = h
        .cache
        .get::<serde_json::Value>(&cache_key!(Namespace::Posts, "rust", 1, 10))
        .await;
    assert!(cached.is_some());
}

#[tokio::test]
async fn view_increment_invalidates_cached_detail() {
    let h = harness();

    let before = h
        .service
        .get_post_by_slug("hello-rust")
        .await
        .expect("read")
        .expect("post exists");
    assert_eq!(before.view_count, 10);
    assert!(
        h.cache
            .get::<serde_json::Value>(&cache_key!(Namespace::Post, "hello-rust"))
            .await
            .is_some()
    );

    h.service.increment_view_count(1).await.expect("increment");

    assert!(
        h.cache
            .get::<serde_json::Value>(&cache_key!(Namespace::Post, "hello-rust"))
            .await
            .is_none()
    );
    let after = h
        .service
        .get_post_by_slug("hello-rust")
        .await
        .expect("read")
        .expect("post exists");
    assert_eq!(after.view_count, 11);
    assert_eq!(h.source.calls("fetch_post_by_slug"), 2);
}

#[tokio::test]
async fn view_increment_refreshes_popular_and_stats_but_keeps_categories() {
    let h = harness();

    h.service.get_popular_posts(5).await.expect("popular");
    h.service.get_stats().await.expect("stats");
    h.service.get_categories().await.expect("categories");

    h.service.increment_view_count(3).await.expect("increment");

    let stats = h.service.get_stats().await.expect("stats");
    h.service.get_popular_posts(5).await.expect("popular");
    h.service.get_categories().await.expect("categories");

    assert_eq!(stats.total_views, 10 + 25 + 3 + 1);
    assert_eq!(h.source.calls("fetch_stats"), 2);
    assert_eq!(h.source.calls("fetch_popular_posts"), 2);
    assert_eq!(h.source.calls("fetch_categories"), 1);
}

#[tokio::test]
async fn failed_increment_propagates_and_invalidates_nothing() {
    let h = harness();
    h.service.get_stats().await.expect("stats");

    let err = h
        .service
        .increment_view_count(99)
        .await
        .expect_err("unknown post");
    assert!(matches!(err, RepoError::NotFound));

    h.service.get_stats().await.expect("stats");
    assert_eq!(h.source.calls("fetch_stats"), 1);
}

#[tokio::test]
async fn source_errors_are_returned_and_not_cached() {
    let h = harness();
    h.source.fail_next(1);

    let err = h
        .service
        .get_categories()
        .await
        .expect_err("source is down");
    assert!(matches!(err, RepoError::Timeout));
    assert!(
        h.cache
            .get::<serde_json::Value>(&cache_key!(Namespace::Categories))
            .await
            .is_none()
    );

    let categories = h.service.get_categories().await.expect("recovered");
    assert_eq!(categories.len(), 1);
    h.service.get_categories().await.expect("cached");
    assert_eq!(h.source.calls("fetch_categories"), 2);
}

#[tokio::test]
async fn listing_expires_after_its_ttl() {
    let h = harness();

    h.service.get_posts(None, 1, 10).await.expect("read");
    h.clock.advance(Duration::from_secs(59));
    h.service.get_posts(None, 1, 10).await.expect("read");
    assert_eq!(h.source.calls("fetch_posts"), 1);

    h.clock.advance(Duration::from_secs(2));
    h.service.get_posts(None, 1, 10).await.expect("read");
    assert_eq!(h.source.calls("fetch_posts"), 2);
}

#[tokio::test]
async fn each_resource_uses_its_own_ttl_class() {
    let h = harness();

    h.service
        .search_posts(&SearchParams::new("rust"))
        .await
        .expect("search");
    h.service.get_categories().await.expect("categories");

    h.clock.advance(Duration::from_secs(31));
    h.service
        .search_posts(&SearchParams::new("rust"))
        .await
        .expect("search");
    h.service.get_categories().await.expect("categories");

    assert_eq!(h.source.calls("search_posts"), 2);
    assert_eq!(h.source.calls("fetch_categories"), 1);
}

#[tokio::test]
async fn searches_with_delimiters_in_terms_do_not_share_entries() {
    let h = harness();

    let scoped = h
        .service
        .search_posts(&SearchParams::new("Hello").in_category("rust:all"))
        .await
        .expect("categorized search");
    let unscoped = h
        .service
        .search_posts(&SearchParams::new("Hello:rust"))
        .await
        .expect("uncategorized search");

    assert_eq!(scoped.total, 0);
    assert_eq!(unscoped.total, 0);
    assert_eq!(h.source.calls("search_posts"), 2);
}

#[tokio::test]
async fn configured_ttl_overrides_defaults() {
    let config = CacheConfig {
        ttl: TtlPolicy {
            categories: Duration::from_secs(5),
            ..TtlPolicy::default()
        },
        ..CacheConfig::default()
    };
    let h = harness_with(config);

    h.service.get_categories().await.expect("categories");
    h.clock.advance(Duration::from_secs(6));
    h.service.get_categories().await.expect("categories");

    assert_eq!(h.source.calls("fetch_categories"), 2);
}

#[tokio::test]
async fn related_posts_exclude_the_post_itself() {
    let h = harness();

    let related = h.service.get_related_posts(1, 1, 3).await.expect("related");
    h.service.get_related_posts(1, 1, 3).await.expect("related");

    assert_eq!(related.len(), 1);
    assert_eq!(related[0].slug, "async-traits");
    assert_eq!(h.source.calls("fetch_related_posts"), 1);
}

#[tokio::test]
async fn external_write_is_visible_after_record_mutation() {
    let h = harness();

    h.service.get_post_by_slug("gardening").await.expect("read");
    h.source.rename(3, "Winter gardening");

    let stale = h
        .service
        .get_post_by_slug("gardening")
        .await
        .expect("read")
        .expect("post");
    assert_eq!(stale.title, "Gardening");

    h.service
        .record_mutation(&Mutation::PostSaved {
            post_id: 3,
            slug: "gardening".to_string(),
        })
        .await;

    let fresh = h
        .service
        .get_post_by_slug("gardening")
        .await
        .expect("read")
        .expect("post");
    assert_eq!(fresh.title, "Winter gardening");
}

#[tokio::test]
async fn clear_cache_forces_refetch_everywhere() {
    let h = harness();

    h.service.get_posts(None, 1, 10).await.expect("posts");
    h.service.get_stats().await.expect("stats");

    assert_eq!(h.service.clear_cache().await, 2);

    h.service.get_posts(None, 1, 10).await.expect("posts");
    h.service.get_stats().await.expect("stats");
    assert_eq!(h.source.calls("fetch_posts"), 2);
    assert_eq!(h.source.calls("fetch_stats"), 2);
}

#[tokio::test]
async fn disabled_cache_always_reads_the_source() {
    let h = harness_with(CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    });

    h.service.get_stats().await.expect("stats");
    h.service.get_stats().await.expect("stats");

    assert_eq!(h.source.calls("fetch_stats"), 2);
}

#[tokio::test]
async fn concurrent_cold_reads_fetch_independently_by_default() {
    let h = harness();
    h.source.yield_on_fetch();

    let (a, b) = tokio::join!(h.service.get_stats(), h.service.get_stats());

    assert_eq!(a.expect("first"), b.expect("second"));
    assert_eq!(h.source.calls("fetch_stats"), 2);
}

#[tokio::test]
async fn coalesced_cold_reads_share_one_fetch() {
    let h = harness_with(CacheConfig {
        coalesce_misses: true,
        ..CacheConfig::default()
    });
    h.source.yield_on_fetch();

    let (a, b) = tokio::join!(h.service.get_stats(), h.service.get_stats());

    assert_eq!(a.expect("first"), b.expect("second"));
    assert_eq!(h.source.calls("fetch_stats"), 1);
}

#[tokio::test]
async fn lru_capacity_bounds_cached_listings() {
    let h = harness_with(CacheConfig {
        capacity: 2,
        ..CacheConfig::default()
    });

    for page in 1..=3 {
        h.service.get_posts(None, page, 1).await.expect("page");
    }
    h.service.get_posts(None, 1, 1).await.expect("page 1 again");

    assert_eq!(h.source.calls("fetch_posts"), 4);
}

/// Backend that refuses every operation.
struct DownStore;

#[async_trait]
impl CacheStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Timeout)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Timeout)
    }

    async fn del(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Timeout)
    }

    async fn del_pattern(&self, _pattern: &str) -> Result<usize, StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }
}

#[tokio::test]
async fn cache_outage_degrades_to_direct_reads() {
    let source = Arc::new(InMemoryBlog::seeded());
    let cache = Arc::new(ContentCache::new(
        Arc::new(DownStore),
        &CacheConfig::default(),
    ));
    let service = BlogService::new(source.clone(), cache, TtlPolicy::default());

    let first = service.get_post_by_slug("hello-rust").await.expect("read");
    service.increment_view_count(1).await.expect("increment");
    let second = service.get_post_by_slug("hello-rust").await.expect("read");

    assert_eq!(first.map(|post| post.view_count), Some(10));
    assert_eq!(second.map(|post| post.view_count), Some(11));
    assert_eq!(source.calls("fetch_post_by_slug"), 2);
}

#[tokio::test]
async fn warmer_populates_landing_entries() {
    let h = harness();

    let report = CacheWarmer::new(h.service.clone()).warm_initial().await;
    assert_eq!(
        report,
        WarmReport {
            warmed: 4,
            failed: 0
        }
    );

    h.service.get_categories().await.expect("categories");
    h.service.get_popular_posts(5).await.expect("popular");
    h.service.get_posts(None, 1, 10).await.expect("posts");
    h.service.get_stats().await.expect("stats");

    for op in [
        "fetch_categories",
        "fetch_popular_posts",
        "fetch_posts",
        "fetch_stats",
    ] {
        assert_eq!(h.source.calls(op), 1, "{op} should have been warmed");
    }
}

#[tokio::test]
async fn warmer_skips_failing_steps() {
    let h = harness();
    h.source.fail_next(1);

    let report = CacheWarmer::new(h.service.clone()).warm_initial().await;

    assert_eq!(
        report,
        WarmReport {
            warmed: 3,
            failed: 1
        }
    );
}

#[test]
fn store_capacity_is_never_zero() {
    let config = CacheConfig {
        capacity: 0,
        ..CacheConfig::default()
    };
    assert_eq!(config.capacity_non_zero(), NonZeroUsize::MIN);
}
