use std::time::Instant;

use metrics::histogram;
use tracing::{info, warn};

use crate::application::blog::BlogService;
use crate::application::repos::RepoError;
use crate::domain::query::{DEFAULT_PAGE_LIMIT, DEFAULT_POPULAR_LIMIT};

const METRIC_CACHE_WARM_MS: &str = "penlog_cache_warm_ms";

/// Outcome of one warming pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub warmed: usize,
    pub failed: usize,
}

/// Pre-populates the entries every landing page reads.
pub struct CacheWarmer {
    service: BlogService,
}

impl CacheWarmer {
    pub fn new(service: BlogService) -> Self {
        Self { service }
    }

    /// Run every step once. A failing step is logged and skipped; the rest
    /// still run.
    pub async fn warm_initial(&self) -> WarmReport {
        info!(target = "penlog::cache_warmer", "warming content cache");
        let started_at = Instant::now();
        let mut report = WarmReport::default();

        Self::record(
            &mut report,
            "categories",
            self.service.get_categories().await.map(drop),
        );
        Self::record(
            &mut report,
            "popular",
            self.service
                .get_popular_posts(DEFAULT_POPULAR_LIMIT)
                .await
                .map(drop),
        );
        Self::record(
            &mut report,
            "posts",
            self.service
                .get_posts(None, 1, DEFAULT_PAGE_LIMIT)
                .await
                .map(drop),
        );
        Self::record(
            &mut report,
            "stats",
            self.service.get_stats().await.map(drop),
        );

        histogram!(METRIC_CACHE_WARM_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "penlog::cache_warmer",
            warmed = report.warmed,
            failed = report.failed,
            "content cache warmed"
        );
        report
    }

    fn record(report: &mut WarmReport, step: &'static str, outcome: Result<(), RepoError>) {
        match outcome {
            Ok(()) => report.warmed += 1,
            Err(err) => {
                report.failed += 1;
                warn!(
                    target = "penlog::cache_warmer",
                    step,
                    error = %err,
                    "skipping cache warm step"
                );
            }
        }
    }
}
