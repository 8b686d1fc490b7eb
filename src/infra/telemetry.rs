use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "penlog_cache_hit_total",
            Unit::Count,
            "Total number of content cache hits, by namespace."
        );
        describe_counter!(
            "penlog_cache_miss_total",
            Unit::Count,
            "Total number of content cache misses, by namespace."
        );
        describe_counter!(
            "penlog_cache_store_error_total",
            Unit::Count,
            "Cache backend failures swallowed by the read-through layer, by operation."
        );
        describe_counter!(
            "penlog_cache_evict_total",
            Unit::Count,
            "Entries evicted from the in-memory store due to capacity."
        );
        describe_counter!(
            "penlog_cache_invalidated_total",
            Unit::Count,
            "Entries removed by pattern invalidation."
        );
        describe_histogram!(
            "penlog_cache_fetch_ms",
            Unit::Milliseconds,
            "Data source latency on cache misses in milliseconds."
        );
        describe_histogram!(
            "penlog_cache_warm_ms",
            Unit::Milliseconds,
            "Cache warm pass latency in milliseconds."
        );
    });
}
