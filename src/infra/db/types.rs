use time::{OffsetDateTime, PrimitiveDateTime};

use crate::domain::entities::{AuthorRef, Category, CategoryRef, Post, PostSummary};

pub(crate) const SUMMARY_COLUMNS: &str = "p.id, p.slug, p.title, p.excerpt, p.cover_image, \
     p.view_count, p.published_at, \
     c.id AS category_id, c.name AS category_name, c.slug AS category_slug, \
     u.id AS author_id, u.name AS author_name, u.avatar AS author_avatar";

pub(crate) const POST_JOINS: &str = " FROM posts p \
     LEFT JOIN categories c ON c.id = p.category_id \
     LEFT JOIN users u ON u.id = p.author_id ";

#[derive(sqlx::FromRow)]
pub(crate) struct PostSummaryRow {
    pub(crate) id: i64,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) excerpt: Option<String>,
    pub(crate) cover_image: Option<String>,
    pub(crate) view_count: i64,
    pub(crate) published_at: Option<PrimitiveDateTime>,
    pub(crate) category_id: Option<i64>,
    pub(crate) category_name: Option<String>,
    pub(crate) category_slug: Option<String>,
    pub(crate) author_id: Option<i64>,
    pub(crate) author_name: Option<String>,
    pub(crate) author_avatar: Option<String>,
}

impl From<PostSummaryRow> for PostSummary {
    fn from(row: PostSummaryRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            cover_image: row.cover_image,
            view_count: row.view_count,
            published_at: row.published_at.map(PrimitiveDateTime::assume_utc),
            category: category_ref(row.category_id, row.category_name, row.category_slug),
            author: author_ref(row.author_id, row.author_name, row.author_avatar),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    #[sqlx(flatten)]
    pub(crate) summary: PostSummaryRow,
    pub(crate) content: String,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let updated_at: OffsetDateTime = row.updated_at.assume_utc();
        let summary = PostSummary::from(row.summary);
        Self {
            id: summary.id,
            slug: summary.slug,
            title: summary.title,
            excerpt: summary.excerpt,
            content: row.content,
            cover_image: summary.cover_image,
            view_count: summary.view_count,
            published_at: summary.published_at,
            updated_at,
            category: summary.category,
            author: summary.author,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) slug: String,
    pub(crate) description: Option<String>,
    pub(crate) post_count: i64,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            post_count: row.post_count.max(0).unsigned_abs(),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct StatsRow {
    pub(crate) total_posts: i64,
    pub(crate) total_views: i64,
    pub(crate) total_categories: i64,
}

fn category_ref(
    id: Option<i64>,
    name: Option<String>,
    slug: Option<String>,
) -> Option<CategoryRef> {
    match (id, name, slug) {
        (Some(id), Some(name), Some(slug)) => Some(CategoryRef { id, name, slug }),
        _ => None,
    }
}

fn author_ref(id: Option<i64>, name: Option<String>, avatar: Option<String>) -> Option<AuthorRef> {
    match (id, name) {
        (Some(id), Some(name)) => Some(AuthorRef { id, name, avatar }),
        _ => None,
    }
}
