//! Repository trait for topic clusters.

use chrono::{DateTime, Utc};

use crate::domain::entities::{ClusterMerge, ClusterPatch, NewCluster, TopicCluster};
use crate::domain::repositories::SortOrder;
use crate::error::AppError;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct ClusterFilter {
    pub is_active: Option<bool>,
    /// Free-text search over name, description and summary.
    pub search: Option<String>,
    pub ordering: Option<SortOrder>,
}

/// Repository interface for topic clusters.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgClusterRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<TopicCluster>, AppError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError>;

    /// Creates a cluster with one member and `last_article_added_at = now()`.
    async fn create(&self, new_cluster: NewCluster) -> Result<TopicCluster, AppError>;

    async fn list(
        &self,
        filter: ClusterFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TopicCluster>, AppError>;

    async fn count(&self, filter: ClusterFilter) -> Result<i64, AppError>;

    /// Active clusters that have a centroid.
    async fn list_active_with_centroids(&self) -> Result<Vec<TopicCluster>, AppError>;

    async fn list_active(&self) -> Result<Vec<TopicCluster>, AppError>;

    /// Writes a recomputed centroid, member count and (optionally) a new
    /// primary article, stamping `last_article_added_at`.
    async fn update_centroid(
        &self,
        id: i64,
        centroid: Vec<f32>,
        article_count: i32,
        primary_article_id: Option<i64>,
    ) -> Result<(), AppError>;

    /// Writes the member count and, when given, the priority score.
    async fn update_statistics(
        &self,
        id: i64,
        article_count: i32,
        priority_score: Option<f64>,
    ) -> Result<(), AppError>;

    async fn set_summary(&self, id: i64, summary: &str) -> Result<(), AppError>;

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the cluster does not exist.
    async fn update(&self, id: i64, patch: ClusterPatch) -> Result<TopicCluster, AppError>;

    async fn deactivate(&self, id: i64) -> Result<(), AppError>;

    /// Returns `true` if a row was deleted.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    async fn record_merge(
        &self,
        source_id: i64,
        target_id: i64,
        reason: &str,
        articles_moved: i32,
    ) -> Result<ClusterMerge, AppError>;

    /// Active clusters with no summary and at least `min_articles` members,
    /// highest priority first.
    async fn list_needing_summary(
        &self,
        min_articles: i32,
        limit: i64,
    ) -> Result<Vec<TopicCluster>, AppError>;

    /// Deactivates empty active clusters created before `created_before`.
    async fn deactivate_empty(&self, created_before: DateTime<Utc>) -> Result<u64, AppError>;
}
