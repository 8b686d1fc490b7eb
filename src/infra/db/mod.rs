//! MySQL-backed data source.
//!
//! Expects the blog schema: `posts`, `categories` and `users` keyed by
//! `BIGINT` ids, `posts.view_count` as `BIGINT` and timestamps as `DATETIME`
//! in UTC. Only rows with `status = 'published'` are ever returned.

mod posts;
mod types;
mod util;

pub use util::{like_pattern, map_sqlx_error};

use std::sync::Arc;

use sqlx::{
    MySql, QueryBuilder,
    mysql::{MySqlPool, MySqlPoolOptions},
    query,
};

use crate::application::repos::RepoError;

const PUBLISHED_STATUS: &str = "published";

#[derive(Clone)]
pub struct MySqlRepositories {
    pool: Arc<MySqlPool>,
}

impl MySqlRepositories {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<MySqlPool, sqlx::Error> {
        MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn push_published_condition(qb: &mut QueryBuilder<'_, MySql>) {
        qb.push(" WHERE p.status = ");
        qb.push_bind(PUBLISHED_STATUS);
        qb.push(" AND p.published_at IS NOT NULL ");
    }

    fn push_category_filter<'q>(qb: &mut QueryBuilder<'q, MySql>, category: Option<&'q str>) {
        if let Some(slug) = category {
            qb.push(" AND c.slug = ");
            qb.push_bind(slug);
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
