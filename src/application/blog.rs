//! Cached blog content service.

use std::sync::Arc;

use tracing::instrument;

use crate::application::repos::{BlogSource, RepoError};
use crate::cache::{ContentCache, Invalidator, Mutation, Namespace, ResourceKind, TtlPolicy};
use crate::cache_key;
use crate::domain::entities::{BlogStats, Category, Paginated, Post, PostSummary};
use crate::domain::query::{
    ALL_CATEGORIES, PageWindow, SearchParams, clamp_limit, normalize_category,
};

/// Read operations over the blog, served through the content cache.
///
/// Every read normalizes its parameters, builds a key in the matching
/// namespace and goes through [`ContentCache::get_or_fetch`]. Writes go to the
/// source first and invalidate only once the source has acknowledged them.
#[derive(Clone)]
pub struct BlogService {
    source: Arc<dyn BlogSource>,
    cache: Arc<ContentCache>,
    invalidator: Invalidator,
    ttl: TtlPolicy,
}

impl BlogService {
    pub fn new(source: Arc<dyn BlogSource>, cache: Arc<ContentCache>, ttl: TtlPolicy) -> Self {
        let invalidator = Invalidator::new(Arc::clone(&cache));
        Self {
            source,
            cache,
            invalidator,
            ttl,
        }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    #[instrument(skip(self))]
    pub async fn get_posts(
        &self,
        category: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Paginated<PostSummary>, RepoError> {
        let category = normalize_category(category);
        let window = PageWindow::new(page, limit);
        let key = cache_key!(
            Namespace::Posts,
            category.as_deref().unwrap_or(ALL_CATEGORIES),
            window.page,
            window.limit
        );

        self.cache
            .get_or_fetch(key, self.ttl.ttl(ResourceKind::Posts), || {
                self.source.fetch_posts(category.as_deref(), window)
            })
            .await
    }

    /// `Ok(None)` for an unknown slug; the absence is cached too.
    #[instrument(skip(self))]
    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let slug = slug.trim();
        let key = cache_key!(Namespace::Post, slug);

        self.cache
            .get_or_fetch(key, self.ttl.ttl(ResourceKind::PostDetail), || {
                self.source.fetch_post_by_slug(slug)
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_popular_posts(&self, limit: u32) -> Result<Vec<PostSummary>, RepoError> {
        let limit = clamp_limit(limit);
        let key = cache_key!(Namespace::Popular, limit);

        self.cache
            .get_or_fetch(key, self.ttl.ttl(ResourceKind::PopularPosts), || {
                self.source.fetch_popular_posts(limit)
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Result<Vec<Category>, RepoError> {
        let key = cache_key!(Namespace::Categories);

        self.cache
            .get_or_fetch(key, self.ttl.ttl(ResourceKind::Categories), || {
                self.source.fetch_categories()
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn search_posts(
        &self,
        params: &SearchParams,
    ) -> Result<Paginated<PostSummary>, RepoError> {
        let params = params.normalized();
        if params.query.is_empty() {
            return Ok(Paginated::empty(params.page, params.limit));
        }

        let key = cache_key!(
            Namespace::Search,
            params.query,
            params.category.as_deref().unwrap_or(ALL_CATEGORIES),
            params.page,
            params.limit
        );

        self.cache
            .get_or_fetch(key, self.ttl.ttl(ResourceKind::SearchResults), || {
                self.source.search_posts(&params)
            })
            .await
    }

    /// Bump the counter in the source, then drop everything that renders it.
    /// A failed write invalidates nothing.
    #[instrument(skip(self))]
    pub async fn increment_view_count(&self, post_id: i64) -> Result<(), RepoError> {
        self.source.increment_view_count(post_id).await?;
        self.invalidator
            .invalidate(&Mutation::ViewCountIncremented { post_id })
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<BlogStats, RepoError> {
        let key = cache_key!(Namespace::Stats);

        self.cache
            .get_or_fetch(key, self.ttl.ttl(ResourceKind::Stats), || {
                self.source.fetch_stats()
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_related_posts(
        &self,
        post_id: i64,
        category_id: i64,
        limit: u32,
    ) -> Result<Vec<PostSummary>, RepoError> {
        let limit = clamp_limit(limit);
        let key = cache_key!(Namespace::Related, post_id, category_id, limit);

        self.cache
            .get_or_fetch(key, self.ttl.ttl(ResourceKind::RelatedPosts), || {
                self.source.fetch_related_posts(post_id, category_id, limit)
            })
            .await
    }

    /// Invalidate after a write that was performed outside this service.
    /// Call only once the write has been committed.
    pub async fn record_mutation(&self, mutation: &Mutation) -> usize {
        self.invalidator.invalidate(mutation).await
    }

    pub async fn record_mutations(&self, mutations: &[Mutation]) -> usize {
        self.invalidator.invalidate_batch(mutations).await
    }

    pub async fn clear_cache(&self) -> usize {
        self.cache.clear().await
    }
}
