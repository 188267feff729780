//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache setup, provider clients, the task
//! worker and scheduler, and the Axum server lifecycle.

use crate::application::scheduler::spawn_scheduler;
use crate::application::worker::{TaskQueue, run_task_worker};
use crate::config::Config;
use crate::infrastructure::cache::{CacheService, NullCache, RedisCache};
use crate::infrastructure::google::{ApiClient, GeminiClient, GmailClient, GoogleOAuthClient};
use crate::infrastructure::http_fetcher::HttpFetcher;
use crate::infrastructure::media::LocalMediaStore;
use crate::routes::app_router;
use crate::state::{AppState, Providers};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Redis cache (or NullCache fallback)
/// - Google and page-fetching clients
/// - Background task worker and, if enabled, the scheduler
/// - Axum HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - An HTTP client cannot be built
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_pool(&config).await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to migrate")?;

    let cache = connect_cache(&config).await;
    let providers = build_providers(&config)?;

    let (task_queue, task_rx) = TaskQueue::new(config.task_queue_capacity);
    let state = AppState::new(
        Arc::new(pool),
        &config,
        providers,
        cache,
        task_queue.clone(),
    );

    let pipeline = Arc::new(state.pipeline());
    tokio::spawn(run_task_worker(
        task_rx,
        pipeline.clone(),
        task_queue.clone(),
        config.task_worker_concurrency,
    ));
    tracing::info!(
        concurrency = config.task_worker_concurrency,
        "Task worker started"
    );

    if config.scheduler_enabled {
        let jobs = spawn_scheduler(pipeline, task_queue);
        tracing::info!(jobs = jobs.len(), "Scheduler started");
    } else {
        tracing::info!("Scheduler disabled");
    }

    let app = app_router(state, &config);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Opens the pool with the `DB_*` limits from the configuration.
pub async fn connect_pool(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}

async fn connect_cache(config: &Config) -> Arc<dyn CacheService> {
    let Some(redis_url) = &config.redis_url else {
        tracing::info!("Cache disabled (NullCache)");
        return Arc::new(NullCache::new());
    };

    match RedisCache::connect(redis_url, config.cache_ttl_seconds).await {
        Ok(redis) => {
            tracing::info!("Cache enabled (Redis)");
            Arc::new(redis)
        }
        Err(e) => {
            tracing::warn!("Failed to connect to Redis: {}. Using NullCache.", e);
            Arc::new(NullCache::new())
        }
    }
}

/// Builds the Google clients, page fetcher and media store.
pub fn build_providers(config: &Config) -> Result<Providers> {
    let api = ApiClient::new()?;

    Ok(Providers {
        ai: Arc::new(GeminiClient::new(
            api.clone(),
            &config.google_api_key,
            &config.embedding_model,
            &config.generation_model,
            &config.image_generation_model,
        )),
        mail: Arc::new(GmailClient::new(api.clone())),
        oauth: Arc::new(GoogleOAuthClient::new(
            api,
            &config.google_oauth_client_id,
            &config.google_oauth_client_secret,
        )),
        fetcher: Arc::new(HttpFetcher::new()?),
        media: Arc::new(LocalMediaStore::new(
            &config.media_root,
            &config.public_base_url,
        )),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
