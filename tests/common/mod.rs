#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, middleware};
use news_aggregator::api::middleware::auth;
use news_aggregator::application::worker::TaskQueue;
use news_aggregator::config::Config;
use news_aggregator::domain::entities::MailMessage;
use news_aggregator::domain::providers::{
    AiProvider, FetchedPage, MailProvider, MediaStore, OAuthProfile, OAuthProvider, OAuthTokens,
    PageFetcher, StoredMedia, TextOptions,
};
use news_aggregator::domain::task::TaskEnvelope;
use news_aggregator::infrastructure::cache::NullCache;
use news_aggregator::state::{AppState, Providers};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const SIGNING_SECRET: &str = "test-signing-secret";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/test".to_string(),
        redis_url: None,
        listen_addr: "127.0.0.1:0".to_string(),
        log_level: "info".to_string(),
        log_format: "text".to_string(),
        behind_proxy: false,
        cache_ttl_seconds: 60,
        token_signing_secret: SIGNING_SECRET.to_string(),
        encryption_key: "0123456789abcdef0123456789abcdef".to_string(),
        public_base_url: "http://localhost:8000".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
        cors_allowed_origins: vec!["http://localhost:3000".to_string()],
        cookie_secure: false,
        google_api_key: "key".to_string(),
        google_oauth_client_id: "client".to_string(),
        google_oauth_client_secret: "secret".to_string(),
        gmail_newsletter_label: "newsletters".to_string(),
        embedding_model: "stub-embed".to_string(),
        generation_model: "stub-text".to_string(),
        image_generation_model: "stub-image".to_string(),
        duplicate_threshold: 0.95,
        cluster_threshold: 0.80,
        media_root: "media".to_string(),
        task_queue_capacity: 100,
        task_worker_concurrency: 1,
        scheduler_enabled: false,
        db_max_connections: 5,
        db_connect_timeout: 5,
        db_idle_timeout: 60,
        db_max_lifetime: 300,
    }
}

/// Deterministic model: fixed embedding, echoing text, 1-byte images.
pub struct StubAi;

#[async_trait]
impl AiProvider for StubAi {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }

    async fn generate_text(&self, _prompt: &str, _options: TextOptions) -> anyhow::Result<String> {
        Ok("A short stub summary.".to_string())
    }

    async fn generate_image(&self, _prompt: &str, _aspect_ratio: &str) -> anyhow::Result<Vec<u8>> {
        Ok(vec![0])
    }

    fn embedding_model(&self) -> String {
        "stub-embed".to_string()
    }

    fn generation_model(&self) -> String {
        "stub-text".to_string()
    }

    fn image_model(&self) -> String {
        "stub-image".to_string()
    }
}

/// An empty mailbox.
pub struct StubMail;

#[async_trait]
impl MailProvider for StubMail {
    async fn list_message_ids(
        &self,
        _access_token: &str,
        _query: &str,
        _max_results: u32,
    ) -> anyhow::Result<Vec<String>> {
        Ok(vec![])
    }

    async fn get_message(
        &self,
        _access_token: &str,
        message_id: &str,
    ) -> anyhow::Result<MailMessage> {
        anyhow::bail!("unknown message {message_id}")
    }
}

/// Accepts any code and signs everyone in as `stub@example.com`.
pub struct StubOAuth;

#[async_trait]
impl OAuthProvider for StubOAuth {
    fn authorize_url(
        &self,
        _scopes: &[&'static str],
        redirect_uri: &str,
        state: &str,
        _offline: bool,
    ) -> String {
        format!("https://accounts.example.com/auth?redirect_uri={redirect_uri}&state={state}")
    }

    async fn exchange_code(&self, _code: &str, _redirect_uri: &str) -> anyhow::Result<OAuthTokens> {
        Ok(OAuthTokens {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
        })
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> anyhow::Result<String> {
        Ok("access".to_string())
    }

    async fn fetch_profile(&self, _access_token: &str) -> anyhow::Result<OAuthProfile> {
        Ok(OAuthProfile {
            subject: "google-stub".to_string(),
            email: "stub@example.com".to_string(),
            name: "Stub".to_string(),
            picture: None,
        })
    }
}

pub struct StubFetcher;

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage> {
        Ok(FetchedPage {
            final_url: url.to_string(),
            status: 200,
            body: "<html><head><title>Stub</title></head><body><p>Body</p></body></html>"
                .to_string(),
        })
    }
}

pub struct StubMedia;

#[async_trait]
impl MediaStore for StubMedia {
    async fn save(&self, relative_path: &str, _bytes: Vec<u8>) -> anyhow::Result<StoredMedia> {
        Ok(StoredMedia {
            path: relative_path.to_string(),
            url: format!("http://localhost:8000/media/{relative_path}"),
        })
    }
}

pub fn stub_providers() -> Providers {
    Providers {
        ai: Arc::new(StubAi),
        mail: Arc::new(StubMail),
        oauth: Arc::new(StubOAuth),
        fetcher: Arc::new(StubFetcher),
        media: Arc::new(StubMedia),
    }
}

/// State over the test pool with stub providers. Queued tasks land in the
/// returned receiver.
pub fn create_test_state(pool: PgPool) -> (AppState, mpsc::Receiver<TaskEnvelope>) {
    let config = test_config();
    let (queue, rx) = TaskQueue::new(config.task_queue_capacity);
    let state = AppState::new(
        Arc::new(pool),
        &config,
        stub_providers(),
        Arc::new(NullCache::new()),
        queue,
    );
    (state, rx)
}

/// Wraps routes in the authentication middleware.
pub fn protected(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.clone(), auth::layer))
}

pub async fn create_user(pool: &PgPool, email: &str, is_admin: bool) -> i64 {
    sqlx::query_scalar("INSERT INTO users (email, name, is_admin) VALUES ($1, $2, $3) RETURNING id")
        .bind(email)
        .bind(email.split('@').next().unwrap_or_default())
        .bind(is_admin)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn connect_gmail(pool: &PgPool, user_id: i64) {
    sqlx::query("UPDATE users SET gmail_connected = TRUE, gmail_refresh_token = 'x' WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Issues a bearer token through the auth service.
pub async fn token_for(state: &AppState, user_id: i64) -> String {
    let (_, token) = state
        .auth_service
        .issue_token(user_id, "test", None)
        .await
        .unwrap();
    token
}

pub async fn create_email(pool: &PgPool, user_id: i64, message_id: &str, subject: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO newsletter_emails (user_id, gmail_message_id, sender_email, sender_name, subject, received_date, raw_html)
         VALUES ($1, $2, 'news@example.com', 'News', $3, NOW(), '<p>Hello</p>')
         RETURNING id",
    )
    .bind(user_id)
    .bind(message_id)
    .bind(subject)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_link(pool: &PgPool, email_id: i64, url: &str, article_id: Option<i64>) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO extracted_links (email_id, raw_url, canonical_url, status, is_valid_article, article_id)
         VALUES ($1, $2, $2, 'valid', TRUE, $3)
         RETURNING id",
    )
    .bind(email_id)
    .bind(url)
    .bind(article_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Inserts an article; `embedding` is stored as-is.
pub async fn create_article(
    pool: &PgPool,
    url: &str,
    title: &str,
    embedding: Option<Vec<f32>>,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO articles (canonical_url, url_hash, title, embedding, scrape_status, word_count)
         VALUES ($1, md5($1), $2, $3, CASE WHEN $3::REAL[] IS NULL THEN 'pending' ELSE 'success' END::scrape_status, 120)
         RETURNING id",
    )
    .bind(url)
    .bind(title)
    .bind(embedding)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_cluster(pool: &PgPool, name: &str, slug: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO topic_clusters (name, slug) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(slug)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Puts articles in a cluster and sets its article count.
pub async fn add_to_cluster(pool: &PgPool, cluster_id: i64, article_ids: &[i64]) {
    sqlx::query("UPDATE articles SET topic_cluster_id = $1, similarity_to_cluster = 0.9 WHERE id = ANY($2)")
        .bind(cluster_id)
        .bind(article_ids)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "UPDATE topic_clusters SET article_count = (SELECT COUNT(*) FROM articles WHERE topic_cluster_id = $1) WHERE id = $1",
    )
    .bind(cluster_id)
    .execute(pool)
    .await
    .unwrap();
}
