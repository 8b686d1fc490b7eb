//! Read-side query parameters.
//!
//! Parameters are normalized before they reach a cache key, so requests that
//! mean the same thing (page 0 vs page 1, `" rust "` vs `"rust"`) share an entry.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_POPULAR_LIMIT: u32 = 5;
pub const DEFAULT_RELATED_LIMIT: u32 = 3;

/// Key argument standing in for "no category filter".
pub const ALL_CATEGORIES: &str = "all";

/// 1-based page number and page size, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: clamp_limit(limit),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_LIMIT)
    }
}

pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_LIMIT)
}

/// Normalize an optional category slug; blank means no filter.
pub fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|slug| !slug.is_empty() && *slug != ALL_CATEGORIES)
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub category: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn page(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// Trimmed query, normalized category and clamped window.
    pub fn normalized(&self) -> Self {
        let window = PageWindow::new(self.page, self.limit);
        Self {
            query: self.query.trim().to_string(),
            category: normalize_category(self.category.as_deref()),
            page: window.page,
            limit: window.limit,
        }
    }

    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.limit)
    }
}
