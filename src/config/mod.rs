//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::TtlPolicy;
use crate::domain::query::{DEFAULT_PAGE_LIMIT, DEFAULT_POPULAR_LIMIT, DEFAULT_RELATED_LIMIT};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "penlog";
const ENV_PREFIX: &str = "PENLOG";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CACHE_CAPACITY: u64 = 1000;

/// Command-line arguments for the penlog binary.
#[derive(Debug, Parser)]
#[command(name = "penlog", version, about = "Cached blog content service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PENLOG_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List published posts, newest first.
    Posts(ListArgs),
    /// Show one post by slug.
    Post {
        #[arg(value_name = "SLUG")]
        slug: String,
    },
    /// Most viewed posts.
    Popular {
        #[arg(long, default_value_t = DEFAULT_POPULAR_LIMIT)]
        limit: u32,
    },
    /// Posts sharing a category with the given post.
    Related {
        #[arg(value_name = "POST_ID")]
        post_id: i64,
        #[arg(value_name = "CATEGORY_ID")]
        category_id: i64,
        #[arg(long, default_value_t = DEFAULT_RELATED_LIMIT)]
        limit: u32,
    },
    /// Categories with their published post counts.
    Categories,
    /// Full-text search over published posts.
    Search(SearchArgs),
    /// Totals across the blog.
    Stats,
    /// Record a view of a post.
    View {
        #[arg(value_name = "POST_ID")]
        post_id: i64,
    },
    /// Populate the cache and report what was warmed.
    Warm,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    /// Restrict to a category slug.
    #[arg(long, value_name = "SLUG")]
    pub category: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
    pub limit: u32,
}

#[derive(Debug, Args, Clone)]
pub struct SearchArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,

    #[command(flatten)]
    pub list: ListArgs,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT", global = true)]
    pub database_max_connections: Option<u32>,

    /// Toggle the content cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the in-memory cache capacity.
    #[arg(long = "cache-capacity", value_name = "ENTRIES", global = true)]
    pub cache_capacity: Option<u64>,

    /// Toggle coalescing of concurrent misses on one key.
    #[arg(
        long = "cache-coalesce-misses",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_coalesce_misses: Option<bool>,

    /// Toggle cache warming before the command runs.
    #[arg(
        long = "cache-warm-on-startup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_warm_on_startup: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    pub coalesce_misses: bool,
    pub warm_on_startup: bool,
    pub ttl: TtlSettings,
}

/// Per-resource TTLs, each strictly positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlSettings {
    pub posts: Duration,
    pub post_detail: Duration,
    pub popular_posts: Duration,
    pub categories: Duration,
    pub search_results: Duration,
    pub stats: Duration,
    pub related_posts: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(coalesce) = overrides.cache_coalesce_misses {
            self.cache.coalesce_misses = Some(coalesce);
        }
        if let Some(warm) = overrides.cache_warm_on_startup {
            self.cache.warm_on_startup = Some(warm);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            cache,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity_value = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    let capacity = usize::try_from(capacity_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid(
                "cache.capacity",
                "must be greater than zero and fit in usize",
            )
        })?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        coalesce_misses: cache.coalesce_misses.unwrap_or(false),
        warm_on_startup: cache.warm_on_startup.unwrap_or(false),
        ttl: build_ttl_settings(cache.ttl)?,
    })
}

fn build_ttl_settings(ttl: RawTtlSettings) -> Result<TtlSettings, LoadError> {
    let defaults = TtlPolicy::default();

    Ok(TtlSettings {
        posts: ttl_or_default(ttl.posts, defaults.posts, "cache.ttl.posts")?,
        post_detail: ttl_or_default(
            ttl.post_detail,
            defaults.post_detail,
            "cache.ttl.post_detail",
        )?,
        popular_posts: ttl_or_default(
            ttl.popular_posts,
            defaults.popular_posts,
            "cache.ttl.popular_posts",
        )?,
        categories: ttl_or_default(
            ttl.categories,
            defaults.categories,
            "cache.ttl.categories",
        )?,
        search_results: ttl_or_default(
            ttl.search_results,
            defaults.search_results,
            "cache.ttl.search_results",
        )?,
        stats: ttl_or_default(ttl.stats, defaults.stats, "cache.ttl.stats")?,
        related_posts: ttl_or_default(
            ttl.related_posts,
            defaults.related_posts,
            "cache.ttl.related_posts",
        )?,
    })
}

fn ttl_or_default(
    seconds: Option<u64>,
    default: Duration,
    key: &'static str,
) -> Result<Duration, LoadError> {
    match seconds {
        Some(0) => Err(LoadError::invalid(key, "must be greater than zero")),
        Some(seconds) => Ok(Duration::from_secs(seconds)),
        None => Ok(default),
    }
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<u64>,
    coalesce_misses: Option<bool>,
    warm_on_startup: Option<bool>,
    ttl: RawTtlSettings,
}

/// TTLs in whole seconds.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTtlSettings {
    posts: Option<u64>,
    post_detail: Option<u64>,
    popular_posts: Option<u64>,
    categories: Option<u64>,
    search_results: Option<u64>,
    stats: Option<u64>,
    related_posts: Option<u64>,
}
