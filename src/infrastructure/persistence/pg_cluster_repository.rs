//! PostgreSQL implementation of topic-cluster repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use super::like_pattern;
use crate::domain::entities::{ClusterMerge, ClusterPatch, NewCluster, TopicCluster};
use crate::domain::repositories::{ClusterFilter, ClusterRepository};
use crate::error::AppError;

const CLUSTER_COLUMNS: &str = "id, name, slug, description, primary_article_id, \
     centroid_embedding, article_count, priority_score, master_summary, summary_generated_at, \
     is_active, last_article_added_at, created_at, updated_at";

/// PostgreSQL repository for topic clusters and merge history.
pub struct PgClusterRepository {
    pool: Arc<PgPool>,
}

impl PgClusterRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn filtered(select: &str, filter: &ClusterFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM topic_clusters WHERE TRUE");

    if let Some(active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR master_summary ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    qb
}

#[async_trait]
impl ClusterRepository for PgClusterRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<TopicCluster>, AppError> {
        let cluster = sqlx::query_as!(
            TopicCluster,
            r#"
            SELECT id, name, slug, description, primary_article_id, centroid_embedding,
                   article_count, priority_score, master_summary, summary_generated_at,
                   is_active, last_article_added_at, created_at, updated_at
            FROM topic_clusters
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(cluster)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar!(
            r#"SELECT EXISTS(SELECT 1 FROM topic_clusters WHERE slug = $1) AS "exists!""#,
            slug
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn create(&self, new_cluster: NewCluster) -> Result<TopicCluster, AppError> {
        let cluster = sqlx::query_as!(
            TopicCluster,
            r#"
            INSERT INTO topic_clusters
                (name, slug, primary_article_id, centroid_embedding, article_count, last_article_added_at)
            VALUES ($1, $2, $3, $4, 1, NOW())
            RETURNING id, name, slug, description, primary_article_id, centroid_embedding,
                      article_count, priority_score, master_summary, summary_generated_at,
                      is_active, last_article_added_at, created_at, updated_at
            "#,
            new_cluster.name,
            new_cluster.slug,
            new_cluster.primary_article_id,
            &new_cluster.centroid_embedding[..]
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(cluster)
    }

    async fn list(
        &self,
        filter: ClusterFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TopicCluster>, AppError> {
        let mut qb = filtered(&format!("SELECT {CLUSTER_COLUMNS}"), &filter);

        let order = filter
            .ordering
            .map(|o| o.to_sql())
            .unwrap_or_else(|| "priority_score DESC, created_at DESC".to_string());
        qb.push(" ORDER BY ")
            .push(order)
            .push(", id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let clusters = qb
            .build_query_as::<TopicCluster>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(clusters)
    }

    async fn count(&self, filter: ClusterFilter) -> Result<i64, AppError> {
        let count = filtered("SELECT COUNT(*)", &filter)
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn list_active_with_centroids(&self) -> Result<Vec<TopicCluster>, AppError> {
        let clusters = sqlx::query_as!(
            TopicCluster,
            r#"
            SELECT id, name, slug, description, primary_article_id, centroid_embedding,
                   article_count, priority_score, master_summary, summary_generated_at,
                   is_active, last_article_added_at, created_at, updated_at
            FROM topic_clusters
            WHERE is_active AND centroid_embedding IS NOT NULL
            ORDER BY id
            "#
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clusters)
    }

    async fn list_active(&self) -> Result<Vec<TopicCluster>, AppError> {
        let clusters = sqlx::query_as!(
            TopicCluster,
            r#"
            SELECT id, name, slug, description, primary_article_id, centroid_embedding,
                   article_count, priority_score, master_summary, summary_generated_at,
                   is_active, last_article_added_at, created_at, updated_at
            FROM topic_clusters
            WHERE is_active
            ORDER BY id
            "#
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clusters)
    }

    async fn update_centroid(
        &self,
        id: i64,
        centroid: Vec<f32>,
        article_count: i32,
        primary_article_id: Option<i64>,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE topic_clusters
            SET centroid_embedding = $2,
                article_count = $3,
                primary_article_id = COALESCE($4, primary_article_id),
                last_article_added_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            &centroid[..],
            article_count,
            primary_article_id
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn update_statistics(
        &self,
        id: i64,
        article_count: i32,
        priority_score: Option<f64>,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE topic_clusters
            SET article_count = $2,
                priority_score = COALESCE($3, priority_score),
                updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            article_count,
            priority_score
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn set_summary(&self, id: i64, summary: &str) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE topic_clusters
            SET master_summary = $2, summary_generated_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            summary
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn update(&self, id: i64, patch: ClusterPatch) -> Result<TopicCluster, AppError> {
        sqlx::query_as!(
            TopicCluster,
            r#"
            UPDATE topic_clusters
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, slug, description, primary_article_id, centroid_embedding,
                      article_count, priority_score, master_summary, summary_generated_at,
                      is_active, last_article_added_at, created_at, updated_at
            "#,
            id,
            patch.name,
            patch.description,
            patch.is_active
        )
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Cluster not found", json!({ "id": id })))
    }

    async fn deactivate(&self, id: i64) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE topic_clusters SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
            id
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query!("DELETE FROM topic_clusters WHERE id = $1", id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_merge(
        &self,
        source_id: i64,
        target_id: i64,
        reason: &str,
        articles_moved: i32,
    ) -> Result<ClusterMerge, AppError> {
        let merge = sqlx::query_as!(
            ClusterMerge,
            r#"
            INSERT INTO cluster_merges (source_cluster_id, target_cluster_id, reason, articles_moved)
            VALUES ($1, $2, $3, $4)
            RETURNING id, source_cluster_id, target_cluster_id, reason, articles_moved, created_at
            "#,
            source_id,
            target_id,
            reason,
            articles_moved
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(merge)
    }

    async fn list_needing_summary(
        &self,
        min_articles: i32,
        limit: i64,
    ) -> Result<Vec<TopicCluster>, AppError> {
        let clusters = sqlx::query_as!(
            TopicCluster,
            r#"
            SELECT id, name, slug, description, primary_article_id, centroid_embedding,
                   article_count, priority_score, master_summary, summary_generated_at,
                   is_active, last_article_added_at, created_at, updated_at
            FROM topic_clusters
            WHERE is_active AND master_summary = '' AND article_count >= $1
            ORDER BY priority_score DESC, id
            LIMIT $2
            "#,
            min_articles,
            limit
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clusters)
    }

    async fn deactivate_empty(&self, created_before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query!(
            r#"
            UPDATE topic_clusters
            SET is_active = FALSE, updated_at = NOW()
            WHERE is_active AND article_count = 0 AND created_at < $1
            "#,
            created_before
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}
