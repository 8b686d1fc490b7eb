//! Data-source traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{BlogStats, Category, Paginated, Post, PostSummary};
use crate::domain::query::{PageWindow, SearchParams};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read and counter operations over published blog content.
///
/// Implementations see only normalized parameters: `page >= 1`, `limit` within
/// `1..=100`, trimmed search text and `None` for "no category filter".
#[async_trait]
pub trait BlogSource: Send + Sync {
    async fn fetch_posts(
        &self,
        category: Option<&str>,
        window: PageWindow,
    ) -> Result<Paginated<PostSummary>, RepoError>;

    /// `Ok(None)` when no published post has this slug.
    async fn fetch_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;

    async fn fetch_popular_posts(&self, limit: u32) -> Result<Vec<PostSummary>, RepoError>;

    async fn fetch_categories(&self) -> Result<Vec<Category>, RepoError>;

    async fn search_posts(
        &self,
        params: &SearchParams,
    ) -> Result<Paginated<PostSummary>, RepoError>;

    /// Fails with [`RepoError::NotFound`] when the post does not exist.
    async fn increment_view_count(&self, post_id: i64) -> Result<(), RepoError>;

    async fn fetch_stats(&self) -> Result<BlogStats, RepoError>;

    /// Other published posts in the same category, most viewed first.
    async fn fetch_related_posts(
        &self,
        post_id: i64,
        category_id: i64,
        limit: u32,
    ) -> Result<Vec<PostSummary>, RepoError>;
}
