use async_trait::async_trait;
use sqlx::{MySql, QueryBuilder};
use tracing::debug;

use crate::application::repos::{BlogSource, RepoError};
use crate::domain::entities::{BlogStats, Category, Paginated, Post, PostSummary};
use crate::domain::query::{PageWindow, SearchParams, clamp_limit};

use super::types::{
    CategoryRow, POST_JOINS, PostRow, PostSummaryRow, SUMMARY_COLUMNS, StatsRow,
};
use super::{MySqlRepositories, PUBLISHED_STATUS, like_pattern, map_sqlx_error};

impl MySqlRepositories {
    async fn count_posts(&self, qb: &mut QueryBuilder<'_, MySql>) -> Result<u64, RepoError> {
        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(total)
    }

    fn push_search_filter<'q>(qb: &mut QueryBuilder<'q, MySql>, pattern: &'q str) {
        qb.push(" AND (p.title LIKE ");
        qb.push_bind(pattern);
        qb.push(" OR p.excerpt LIKE ");
        qb.push_bind(pattern);
        qb.push(" OR p.content LIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }

    fn push_page(qb: &mut QueryBuilder<'_, MySql>, window: PageWindow) {
        qb.push(" ORDER BY p.published_at DESC, p.id DESC LIMIT ");
        qb.push_bind(window.limit);
        qb.push(" OFFSET ");
        qb.push_bind(window.offset());
    }
}

#[async_trait]
impl BlogSource for MySqlRepositories {
    async fn fetch_posts(
        &self,
        category: Option<&str>,
        window: PageWindow,
    ) -> Result<Paginated<PostSummary>, RepoError> {
        let window = PageWindow::new(window.page, window.limit);

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(SUMMARY_COLUMNS).push(POST_JOINS);
        Self::push_published_condition(&mut qb);
        Self::push_category_filter(&mut qb, category);
        Self::push_page(&mut qb, window);

        let rows: Vec<PostSummaryRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut count = QueryBuilder::new("SELECT COUNT(*)");
        count.push(POST_JOINS);
        Self::push_published_condition(&mut count);
        Self::push_category_filter(&mut count, category);
        let total = self.count_posts(&mut count).await?;

        debug!(rows = rows.len(), total, "Fetched post listing");
        Ok(Paginated::new(
            rows.into_iter().map(PostSummary::from).collect(),
            total,
            window.page,
            window.limit,
        ))
    }

    async fn fetch_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(SUMMARY_COLUMNS)
            .push(", p.content, p.updated_at")
            .push(POST_JOINS);
        Self::push_published_condition(&mut qb);
        qb.push(" AND p.slug = ");
        qb.push_bind(slug);
        qb.push(" LIMIT 1");

        let row: Option<PostRow> = qb
            .build_query_as()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(Post::from))
    }

    async fn fetch_popular_posts(&self, limit: u32) -> Result<Vec<PostSummary>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(SUMMARY_COLUMNS).push(POST_JOINS);
        Self::push_published_condition(&mut qb);
        qb.push(" ORDER BY p.view_count DESC, p.published_at DESC LIMIT ");
        qb.push_bind(clamp_limit(limit));

        let rows: Vec<PostSummaryRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostSummary::from).collect())
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, RepoError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.slug, c.description, COUNT(p.id) AS post_count
            FROM categories c
            LEFT JOIN posts p
                ON p.category_id = c.id
                AND p.status = ?
                AND p.published_at IS NOT NULL
            GROUP BY c.id, c.name, c.slug, c.description
            ORDER BY c.name, c.slug
            "#,
        )
        .bind(PUBLISHED_STATUS)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn search_posts(
        &self,
        params: &SearchParams,
    ) -> Result<Paginated<PostSummary>, RepoError> {
        let window = params.window();
        let pattern = like_pattern(params.query.trim());
        let category = params.category.as_deref();

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(SUMMARY_COLUMNS).push(POST_JOINS);
        Self::push_published_condition(&mut qb);
        Self::push_category_filter(&mut qb, category);
        Self::push_search_filter(&mut qb, &pattern);
        Self::push_page(&mut qb, window);

        let rows: Vec<PostSummaryRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut count = QueryBuilder::new("SELECT COUNT(*)");
        count.push(POST_JOINS);
        Self::push_published_condition(&mut count);
        Self::push_category_filter(&mut count, category);
        Self::push_search_filter(&mut count, &pattern);
        let total = self.count_posts(&mut count).await?;

        Ok(Paginated::new(
            rows.into_iter().map(PostSummary::from).collect(),
            total,
            window.page,
            window.limit,
        ))
    }

    async fn increment_view_count(&self, post_id: i64) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE posts SET view_count = view_count + 1 WHERE id = ? AND status = ?",
        )
        .bind(post_id)
        .bind(PUBLISHED_STATUS)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn fetch_stats(&self) -> Result<BlogStats, RepoError> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM posts WHERE status = ?) AS total_posts,
                (SELECT CAST(COALESCE(SUM(view_count), 0) AS SIGNED)
                    FROM posts WHERE status = ?) AS total_views,
                (SELECT COUNT(*) FROM categories) AS total_categories
            "#,
        )
        .bind(PUBLISHED_STATUS)
        .bind(PUBLISHED_STATUS)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(BlogStats {
            total_posts: Self::convert_count(row.total_posts)?,
            total_views: Self::convert_count(row.total_views)?,
            total_categories: Self::convert_count(row.total_categories)?,
        })
    }

    async fn fetch_related_posts(
        &self,
        post_id: i64,
        category_id: i64,
        limit: u32,
    ) -> Result<Vec<PostSummary>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(SUMMARY_COLUMNS).push(POST_JOINS);
        Self::push_published_condition(&mut qb);
        qb.push(" AND p.category_id = ");
        qb.push_bind(category_id);
        qb.push(" AND p.id <> ");
        qb.push_bind(post_id);
        qb.push(" ORDER BY p.view_count DESC, p.published_at DESC LIMIT ");
        qb.push_bind(clamp_limit(limit));

        let rows: Vec<PostSummaryRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostSummary::from).collect())
    }
}
