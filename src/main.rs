use std::{io::Write, process, sync::Arc};

use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

use penlog::{
    application::{
        blog::BlogService,
        repos::BlogSource,
        warmer::{CacheWarmer, WarmReport},
    },
    cache::{CacheConfig, ContentCache},
    config::{self, Command},
    domain::query::SearchParams,
    infra::{db::MySqlRepositories, error::InfraError, telemetry},
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let source = init_source(&settings).await?;
    let cache_config = CacheConfig::from(&settings.cache);
    let cache = Arc::new(ContentCache::in_memory(&cache_config));
    let service = BlogService::new(source, cache, cache_config.ttl.clone());

    if cache_config.warm_on_startup && !matches!(cli_args.command, Command::Warm) {
        CacheWarmer::new(service.clone()).warm_initial().await;
    }

    run_command(&service, cli_args.command).await
}

async fn init_source(settings: &config::Settings) -> Result<Arc<dyn BlogSource>, InfraError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::database("database url is not configured"))?;

    let pool = MySqlRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    let repositories = MySqlRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    info!(
        max_connections = settings.database.max_connections.get(),
        "connected to blog database"
    );
    Ok(Arc::new(repositories))
}

async fn run_command(service: &BlogService, command: Command) -> Result<(), InfraError> {
    match command {
        Command::Posts(list) => {
            let page = service
                .get_posts(list.category.as_deref(), list.page, list.limit)
                .await?;
            print_json(&page)
        }
        Command::Post { slug } => print_json(&service.get_post_by_slug(&slug).await?),
        Command::Popular { limit } => print_json(&service.get_popular_posts(limit).await?),
        Command::Related {
            post_id,
            category_id,
            limit,
        } => print_json(
            &service
                .get_related_posts(post_id, category_id, limit)
                .await?,
        ),
        Command::Categories => print_json(&service.get_categories().await?),
        Command::Search(search) => {
            let mut params =
                SearchParams::new(search.query).page(search.list.page, search.list.limit);
            params.category = search.list.category;
            print_json(&service.search_posts(&params).await?)
        }
        Command::Stats => print_json(&service.get_stats().await?),
        Command::View { post_id } => {
            service.increment_view_count(post_id).await?;
            print_json(&serde_json::json!({ "post_id": post_id, "recorded": true }))
        }
        Command::Warm => {
            let WarmReport { warmed, failed } =
                CacheWarmer::new(service.clone()).warm_initial().await;
            print_json(&serde_json::json!({ "warmed": warmed, "failed": failed }))
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), InfraError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
