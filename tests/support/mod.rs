#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::macros::datetime;

use penlog::application::repos::{BlogSource, RepoError};
use penlog::domain::entities::{BlogStats, Category, CategoryRef, Paginated, Post, PostSummary};
use penlog::domain::query::{PageWindow, SearchParams};

/// In-memory blog that counts calls per operation and can be told to fail.
pub struct InMemoryBlog {
    posts: Mutex<Vec<Post>>,
    categories: Vec<Category>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures_left: AtomicUsize,
    yield_on_fetch: AtomicBool,
}

impl InMemoryBlog {
    pub fn seeded() -> Self {
        let rust = CategoryRef {
            id: 1,
            name: "Rust".to_string(),
            slug: "rust".to_string(),
        };
        let posts = vec![
            post(1, "hello-rust", "Hello Rust", Some(rust.clone()), 10),
            post(2, "async-traits", "Async traits", Some(rust), 25),
            post(3, "gardening", "Gardening", None, 3),
        ];
        let categories = vec![Category {
            id: 1,
            name: "Rust".to_string(),
            slug: "rust".to_string(),
            description: None,
            post_count: 2,
        }];

        Self {
            posts: Mutex::new(posts),
            categories,
            calls: Mutex::new(HashMap::new()),
            failures_left: AtomicUsize::new(0),
            yield_on_fetch: AtomicBool::new(false),
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    /// Fail the next `count` reads with a timeout.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Yield to the scheduler inside every read, so concurrent callers interleave.
    pub fn yield_on_fetch(&self) {
        self.yield_on_fetch.store(true, Ordering::SeqCst);
    }

    pub fn rename(&self, post_id: i64, title: &str) {
        let mut posts = self.posts.lock().expect("posts lock");
        if let Some(post) = posts.iter_mut().find(|post| post.id == post_id) {
            post.title = title.to_string();
        }
    }

    async fn enter(&self, op: &'static str) -> Result<(), RepoError> {
        *self.calls.lock().expect("calls lock").entry(op).or_default() += 1;
        if self.yield_on_fetch.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }

    fn summaries(&self, filter: impl Fn(&Post) -> bool) -> Vec<PostSummary> {
        self.posts
            .lock()
            .expect("posts lock")
            .iter()
            .filter(|post| filter(post))
            .map(Post::summary)
            .collect()
    }
}

fn post(id: i64, slug: &str, title: &str, category: Option<CategoryRef>, views: i64) -> Post {
    Post {
        id,
        slug: slug.to_string(),
        title: title.to_string(),
        excerpt: None,
        content: format!("{title} body"),
        cover_image: None,
        view_count: views,
        published_at: Some(datetime!(2024-05-01 08:00 UTC)),
        updated_at: datetime!(2024-05-01 08:00 UTC),
        category,
        author: None,
    }
}

fn in_category(post: &Post, slug: Option<&str>) -> bool {
    match slug {
        Some(slug) => post
            .category
            .as_ref()
            .is_some_and(|category| category.slug == slug),
        None => true,
    }
}

fn paginate(items: Vec<PostSummary>, window: PageWindow) -> Paginated<PostSummary> {
    let total = items.len() as u64;
    let page = items
        .into_iter()
        .skip(window.offset() as usize)
        .take(window.limit as usize)
        .collect();
    Paginated::new(page, total, window.page, window.limit)
}

#[async_trait]
impl BlogSource for InMemoryBlog {
    async fn fetch_posts(
        &self,
        category: Option<&str>,
        window: PageWindow,
    ) -> Result<Paginated<PostSummary>, RepoError> {
        self.enter("fetch_posts").await?;
        Ok(paginate(
            self.summaries(|post| in_category(post, category)),
            window,
        ))
    }

    async fn fetch_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        self.enter("fetch_post_by_slug").await?;
        Ok(self
            .posts
            .lock()
            .expect("posts lock")
            .iter()
            .find(|post| post.slug == slug)
            .cloned())
    }

    async fn fetch_popular_posts(&self, limit: u32) -> Result<Vec<PostSummary>, RepoError> {
        self.enter("fetch_popular_posts").await?;
        let mut posts = self.summaries(|_| true);
        posts.sort_by(|a, b| b.view_count.cmp(&a.view_count));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, RepoError> {
        self.enter("fetch_categories").await?;
        Ok(self.categories.clone())
    }

    async fn search_posts(
        &self,
        params: &SearchParams,
    ) -> Result<Paginated<PostSummary>, RepoError> {
        self.enter("search_posts").await?;
        let needle = params.query.to_lowercase();
        let category = params.category.as_deref();
        Ok(paginate(
            self.summaries(|post| {
                in_category(post, category) && post.title.to_lowercase().contains(&needle)
            }),
            params.window(),
        ))
    }

    async fn increment_view_count(&self, post_id: i64) -> Result<(), RepoError> {
        self.enter("increment_view_count").await?;
        let mut posts = self.posts.lock().expect("posts lock");
        let post = posts
            .iter_mut()
            .find(|post| post.id == post_id)
            .ok_or(RepoError::NotFound)?;
        post.view_count += 1;
        Ok(())
    }

    async fn fetch_stats(&self) -> Result<BlogStats, RepoError> {
        self.enter("fetch_stats").await?;
        let posts = self.posts.lock().expect("posts lock");
        Ok(BlogStats {
            total_posts: posts.len() as u64,
            total_views: posts.iter().map(|post| post.view_count as u64).sum(),
            total_categories: self.categories.len() as u64,
        })
    }

    async fn fetch_related_posts(
        &self,
        post_id: i64,
        category_id: i64,
        limit: u32,
    ) -> Result<Vec<PostSummary>, RepoError> {
        self.enter("fetch_related_posts").await?;
        let mut related = self.summaries(|post| {
            post.id != post_id
                && post
                    .category
                    .as_ref()
                    .is_some_and(|category| category.id == category_id)
        });
        related.truncate(limit as usize);
        Ok(related)
    }
}
