//! Mutation-driven invalidation.
//!
//! Each write to the underlying rows is described by a [`Mutation`]. After the
//! data source has acknowledged the write, the [`Invalidator`] drops every
//! namespace whose entries could now render stale data. Namespaces are picked
//! conservatively, so a mutation usually drops more than strictly needed.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::keys::Namespace;
use super::read_through::ContentCache;

/// A state change in the blog data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A post's view counter went up.
    ViewCountIncremented { post_id: i64 },
    /// A post was created or edited.
    PostSaved { post_id: i64, slug: String },
    /// A post was removed.
    PostDeleted { post_id: i64, slug: String },
    /// A category was created, renamed or removed.
    CategoryChanged { category_id: i64 },
}

impl Mutation {
    /// Namespaces that may hold data made stale by this mutation.
    pub fn affected_namespaces(&self) -> &'static [Namespace] {
        match self {
            // Anything that renders a view count or a popularity ordering.
            Mutation::ViewCountIncremented { .. } => &[
                Namespace::Post,
                Namespace::Posts,
                Namespace::Popular,
                Namespace::Related,
                Namespace::Search,
                Namespace::Stats,
            ],
            Mutation::PostSaved { .. } | Mutation::PostDeleted { .. } => &Namespace::ALL,
            Mutation::CategoryChanged { .. } => &[
                Namespace::Categories,
                Namespace::Post,
                Namespace::Posts,
                Namespace::Popular,
                Namespace::Related,
                Namespace::Search,
                Namespace::Stats,
            ],
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::ViewCountIncremented { post_id } => {
                write!(f, "view count incremented for post {post_id}")
            }
            Mutation::PostSaved { post_id, slug } => write!(f, "post {post_id} ({slug}) saved"),
            Mutation::PostDeleted { post_id, slug } => {
                write!(f, "post {post_id} ({slug}) deleted")
            }
            Mutation::CategoryChanged { category_id } => {
                write!(f, "category {category_id} changed")
            }
        }
    }
}

/// Deduplicated set of namespaces to drop for a batch of mutations.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    namespaces: BTreeSet<&'static str>,
}

impl InvalidationPlan {
    pub fn from_mutations<'a>(mutations: impl IntoIterator<Item = &'a Mutation>) -> Self {
        let namespaces = mutations
            .into_iter()
            .flat_map(|mutation| mutation.affected_namespaces().iter())
            .map(|namespace| namespace.as_str())
            .collect();
        Self { namespaces }
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Glob patterns in a stable order. Each namespace contributes its bare
    /// name, for argument-less keys such as `categories`, and `name:*`.
    pub fn patterns(&self) -> impl Iterator<Item = String> + '_ {
        self.namespaces
            .iter()
            .flat_map(|namespace| [namespace.to_string(), format!("{namespace}:*")])
    }
}

/// Applies invalidation plans to the shared cache.
#[derive(Clone)]
pub struct Invalidator {
    cache: Arc<ContentCache>,
}

impl Invalidator {
    pub fn new(cache: Arc<ContentCache>) -> Self {
        Self { cache }
    }

    /// Drop everything `mutation` may have made stale. Returns the number of
    /// removed entries.
    pub async fn invalidate(&self, mutation: &Mutation) -> usize {
        let removed = self
            .apply(&InvalidationPlan::from_mutations([mutation]))
            .await;
        info!(%mutation, removed, "Invalidated cache after write");
        removed
    }

    /// Drop everything a batch of mutations may have made stale.
    pub async fn invalidate_batch(&self, mutations: &[Mutation]) -> usize {
        let plan = InvalidationPlan::from_mutations(mutations);
        let removed = self.apply(&plan).await;
        info!(
            mutations = mutations.len(),
            removed, "Invalidated cache after batched writes"
        );
        removed
    }

    async fn apply(&self, plan: &InvalidationPlan) -> usize {
        let mut removed = 0;
        for pattern in plan.patterns() {
            removed += self.cache.del_pattern(&pattern).await;
        }
        removed
    }
}
