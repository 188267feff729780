//! Repository trait for articles.

use chrono::{DateTime, Utc};

use crate::domain::entities::{
    Article, ArticleEmbedding, NewArticle, ScrapeStatus, ScrapedContent,
};
use crate::domain::repositories::SortOrder;
use crate::error::AppError;
use async_trait::async_trait;

/// Filters for the public article listing.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub scrape_status: Option<ScrapeStatus>,
    pub topic_cluster_id: Option<i64>,
    /// Case-insensitive substring of the publication name.
    pub publication: Option<String>,
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub has_cluster: Option<bool>,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
    /// Free-text search over title, body and URL.
    pub search: Option<String>,
    pub ordering: Option<SortOrder>,
}

/// Repository interface for articles.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgArticleRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_article.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Article>, AppError>;

    async fn find_by_hash(&self, url_hash: &str) -> Result<Option<Article>, AppError>;

    async fn find_many(&self, ids: Vec<i64>) -> Result<Vec<Article>, AppError>;

    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the canonical URL is already stored.
    async fn create(&self, new_article: NewArticle) -> Result<Article, AppError>;

    async fn list(
        &self,
        filter: ArticleFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, AppError>;

    async fn count(&self, filter: ArticleFilter) -> Result<i64, AppError>;

    /// Moves an article to `in_progress`, bumps its attempt counter and stamps
    /// `last_scrape_at`.
    async fn mark_scrape_started(&self, id: i64) -> Result<Article, AppError>;

    async fn save_scraped(&self, id: i64, content: ScrapedContent) -> Result<(), AppError>;

    async fn mark_scrape_failed(&self, id: i64, error: &str) -> Result<(), AppError>;

    async fn set_embedding(&self, id: i64, embedding: Vec<f32>, model: &str)
    -> Result<(), AppError>;

    async fn set_summary(&self, id: i64, summary: &str) -> Result<(), AppError>;

    async fn assign_cluster(
        &self,
        id: i64,
        cluster_id: Option<i64>,
        similarity: Option<f64>,
    ) -> Result<(), AppError>;

    /// Pending articles below the attempt limit, oldest first.
    async fn list_pending(&self, max_attempts: i32, limit: i64) -> Result<Vec<Article>, AppError>;

    async fn count_pending(&self, max_attempts: i32) -> Result<i64, AppError>;

    /// Failed articles below the attempt limit whose last try is older than `before`.
    async fn list_retryable(
        &self,
        max_attempts: i32,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Article>, AppError>;

    /// Successfully scraped articles that still lack an embedding.
    async fn list_missing_embeddings(&self, limit: i64) -> Result<Vec<Article>, AppError>;

    /// All embedded articles except `exclude_id`.
    async fn list_embeddings(&self, exclude_id: i64) -> Result<Vec<ArticleEmbedding>, AppError>;

    /// Up to `limit` embeddings of a cluster's members.
    async fn cluster_embeddings(
        &self,
        cluster_id: i64,
        limit: i64,
    ) -> Result<Vec<ArticleEmbedding>, AppError>;

    async fn list_in_cluster(
        &self,
        cluster_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, AppError>;

    async fn count_in_cluster(&self, cluster_id: i64) -> Result<i64, AppError>;

    /// Members published (or, lacking a date, created) after `since`.
    async fn count_recent_in_cluster(
        &self,
        cluster_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError>;

    /// Successfully scraped members, newest publication first.
    async fn list_scraped_in_cluster(
        &self,
        cluster_id: i64,
        limit: i64,
    ) -> Result<Vec<Article>, AppError>;

    /// Re-points every member of `from` to `to`. Returns the number moved.
    async fn move_cluster(&self, from: i64, to: i64) -> Result<i64, AppError>;

    /// Records a duplicate pair; a pair that already exists is left alone.
    async fn record_duplicate(
        &self,
        primary_id: i64,
        duplicate_id: i64,
        similarity: f64,
    ) -> Result<(), AppError>;

    async fn count_by_status(&self) -> Result<Vec<(ScrapeStatus, i64)>, AppError>;
}
