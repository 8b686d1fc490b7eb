//! TTL policy table.
//!
//! Every call site that populates the cache looks its TTL up here. Listing
//! data is short-lived, near-static data (categories) long-lived, search the
//! shortest. Values come from configuration at startup and never change while
//! the process runs.

use std::time::Duration;

use super::keys::Namespace;

const DEFAULT_POSTS_TTL_SECS: u64 = 60;
const DEFAULT_POST_DETAIL_TTL_SECS: u64 = 300;
const DEFAULT_POPULAR_POSTS_TTL_SECS: u64 = 120;
const DEFAULT_CATEGORIES_TTL_SECS: u64 = 600;
const DEFAULT_SEARCH_RESULTS_TTL_SECS: u64 = 30;
const DEFAULT_STATS_TTL_SECS: u64 = 300;
const DEFAULT_RELATED_POSTS_TTL_SECS: u64 = 300;

/// Logical resource types with their own TTL class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Posts,
    PostDetail,
    PopularPosts,
    Categories,
    SearchResults,
    Stats,
    RelatedPosts,
}

impl ResourceKind {
    /// Cache namespace holding entries of this kind.
    pub fn namespace(self) -> Namespace {
        match self {
            ResourceKind::Posts => Namespace::Posts,
            ResourceKind::PostDetail => Namespace::Post,
            ResourceKind::PopularPosts => Namespace::Popular,
            ResourceKind::Categories => Namespace::Categories,
            ResourceKind::SearchResults => Namespace::Search,
            ResourceKind::Stats => Namespace::Stats,
            ResourceKind::RelatedPosts => Namespace::Related,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    pub posts: Duration,
    pub post_detail: Duration,
    pub popular_posts: Duration,
    pub categories: Duration,
    pub search_results: Duration,
    pub stats: Duration,
    pub related_posts: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            posts: Duration::from_secs(DEFAULT_POSTS_TTL_SECS),
            post_detail: Duration::from_secs(DEFAULT_POST_DETAIL_TTL_SECS),
            popular_posts: Duration::from_secs(DEFAULT_POPULAR_POSTS_TTL_SECS),
            categories: Duration::from_secs(DEFAULT_CATEGORIES_TTL_SECS),
            search_results: Duration::from_secs(DEFAULT_SEARCH_RESULTS_TTL_SECS),
            stats: Duration::from_secs(DEFAULT_STATS_TTL_SECS),
            related_posts: Duration::from_secs(DEFAULT_RELATED_POSTS_TTL_SECS),
        }
    }
}

impl From<&crate::config::TtlSettings> for TtlPolicy {
    fn from(settings: &crate::config::TtlSettings) -> Self {
        Self {
            posts: settings.posts,
            post_detail: settings.post_detail,
            popular_posts: settings.popular_posts,
            categories: settings.categories,
            search_results: settings.search_results,
            stats: settings.stats,
            related_posts: settings.related_posts,
        }
    }
}

impl TtlPolicy {
    pub fn ttl(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Posts => self.posts,
            ResourceKind::PostDetail => self.post_detail,
            ResourceKind::PopularPosts => self.popular_posts,
            ResourceKind::Categories => self.categories,
            ResourceKind::SearchResults => self.search_results,
            ResourceKind::Stats => self.stats,
            ResourceKind::RelatedPosts => self.related_posts,
        }
    }
}
