//! Deduplication and topic clustering over article embeddings.
//!
//! Similarity is cosine similarity computed in-process over the stored
//! `REAL[]` vectors. Two thresholds split the scale:
//!
//! ```text
//! 0 ─────────── cluster_threshold ─────────── duplicate_threshold ─── 1
//!    unrelated          same topic (similar)            duplicate
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::application::services::unique_slug;
use crate::domain::entities::{
    Article, ArticleEmbedding, ClusterMerge, ClusterPatch, NewCluster, ScoredArticle, TopicCluster,
};
use crate::domain::repositories::{ArticleRepository, ClusterFilter, ClusterRepository};
use crate::domain::task::Task;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::text::{slugify, truncate};
use crate::utils::vector::{cosine_similarity, mean};

const MAX_DUPLICATES: usize = 10;
const MAX_SIMILAR: usize = 20;
const CENTROID_SAMPLE: i64 = 100;
const MIN_MEMBERS_FOR_PRIMARY: usize = 3;
const RECENT_DAYS: i64 = 7;
const SUMMARY_MIN_ARTICLES: i32 = 3;
const SUMMARY_BATCH: i64 = 5;
const EMPTY_CLUSTER_GRACE_DAYS: i64 = 7;

/// Redis key holding the last similarity search for an article.
pub fn similar_cache_key(article_id: i64) -> String {
    format!("similar:{article_id}")
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedSimilar {
    threshold: f64,
    limit: i64,
    ids: Vec<i64>,
}

/// Scores `candidates` against `embedding`, keeps those accepted by `keep`,
/// best first.
fn rank(
    embedding: &[f32],
    candidates: Vec<ArticleEmbedding>,
    keep: impl Fn(f64) -> bool,
    limit: usize,
) -> Vec<ScoredArticle> {
    let mut scored: Vec<ScoredArticle> = candidates
        .into_iter()
        .map(|c| ScoredArticle {
            similarity: cosine_similarity(embedding, &c.embedding),
            id: c.id,
            topic_cluster_id: c.topic_cluster_id,
            created_at: c.created_at,
        })
        .filter(|s| keep(s.similarity))
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

/// Priority favours clusters with many recent articles.
fn priority_score(article_count: i64, recent_count: i64) -> f64 {
    article_count as f64 * 0.3 + recent_count as f64 * 0.7
}

pub struct ClusterService<A: ArticleRepository, C: ClusterRepository> {
    articles: Arc<A>,
    clusters: Arc<C>,
    cache: Arc<dyn CacheService>,
    duplicate_threshold: f64,
    cluster_threshold: f64,
}

impl<A: ArticleRepository, C: ClusterRepository> ClusterService<A, C> {
    pub fn new(
        articles: Arc<A>,
        clusters: Arc<C>,
        cache: Arc<dyn CacheService>,
        duplicate_threshold: f64,
        cluster_threshold: f64,
    ) -> Self {
        Self {
            articles,
            clusters,
            cache,
            duplicate_threshold,
            cluster_threshold,
        }
    }

    async fn require_article(&self, id: i64) -> Result<Article, AppError> {
        self.articles
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Article not found", json!({ "id": id })))
    }

    async fn require_cluster(&self, id: i64) -> Result<TopicCluster, AppError> {
        self.clusters
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Cluster not found", json!({ "id": id })))
    }

    /// Articles above the duplicate threshold, best first.
    pub async fn find_duplicates(&self, article: &Article) -> Result<Vec<ScoredArticle>, AppError> {
        let Some(embedding) = article.embedding.as_deref().filter(|e| !e.is_empty()) else {
            return Ok(vec![]);
        };

        let candidates = self.articles.list_embeddings(article.id).await?;
        let threshold = self.duplicate_threshold;
        Ok(rank(embedding, candidates, |s| s > threshold, MAX_DUPLICATES))
    }

    /// Same-topic articles: above the cluster threshold, at or below the
    /// duplicate threshold.
    pub async fn find_similar(&self, article: &Article) -> Result<Vec<ScoredArticle>, AppError> {
        let Some(embedding) = article.embedding.as_deref().filter(|e| !e.is_empty()) else {
            return Ok(vec![]);
        };

        let candidates = self.articles.list_embeddings(article.id).await?;
        let (low, high) = (self.cluster_threshold, self.duplicate_threshold);
        Ok(rank(
            embedding,
            candidates,
            |s| s > low && s <= high,
            MAX_SIMILAR,
        ))
    }

    /// Similarity search for the API, cached per article.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] when `article_id` is missing or the article
    ///   has no embedding
    /// - [`AppError::NotFound`] for unknown articles
    pub async fn similar_to(
        &self,
        article_id: Option<i64>,
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<Article>, AppError> {
        let article_id = article_id
            .ok_or_else(|| AppError::bad_request("article_id is required", json!({})))?;
        let article = self.require_article(article_id).await?;

        let Some(embedding) = article.embedding.as_deref().filter(|e| !e.is_empty()) else {
            return Err(AppError::bad_request(
                "Article has no embedding",
                json!({ "article_id": article_id }),
            ));
        };

        let key = similar_cache_key(article_id);
        if let Ok(Some(raw)) = self.cache.get(&key).await
            && let Ok(cached) = serde_json::from_str::<CachedSimilar>(&raw)
            && cached.threshold == threshold
            && cached.limit == limit
        {
            tracing::debug!(article_id, "Similar articles served from cache");
            return self.load_ordered(cached.ids).await;
        }

        let candidates = self.articles.list_embeddings(article_id).await?;
        let ids: Vec<i64> = rank(
            embedding,
            candidates,
            |s| s > threshold,
            usize::try_from(limit).unwrap_or(0),
        )
        .into_iter()
        .map(|s| s.id)
        .collect();

        let cached = CachedSimilar {
            threshold,
            limit,
            ids: ids.clone(),
        };
        if let Ok(value) = serde_json::to_string(&cached)
            && let Err(e) = self.cache.set(&key, &value, None).await
        {
            tracing::warn!(article_id, error = %e, "Failed to cache similar articles");
        }

        self.load_ordered(ids).await
    }

    async fn load_ordered(&self, ids: Vec<i64>) -> Result<Vec<Article>, AppError> {
        let mut articles = self.articles.find_many(ids.clone()).await?;
        articles.sort_by_key(|a| ids.iter().position(|id| *id == a.id));
        Ok(articles)
    }

    /// Deduplicates an embedded article and assigns it to a cluster.
    ///
    /// Returns the cluster id, or `None` when the article has no embedding.
    pub async fn process_article(&self, article_id: i64) -> Result<Option<i64>, AppError> {
        let article = self.require_article(article_id).await?;
        let Some(embedding) = article.embedding.clone().filter(|e| !e.is_empty()) else {
            tracing::warn!(article_id, "Article has no embedding");
            return Ok(None);
        };

        let duplicates = self.find_duplicates(&article).await?;
        if let Some(best) = duplicates.first() {
            let best_score = best.similarity;
            let primary = duplicates
                .iter()
                .min_by_key(|d| d.created_at)
                .unwrap_or(best);

            self.articles
                .record_duplicate(primary.id, article_id, best_score)
                .await?;
            tracing::info!(
                article_id,
                primary_id = primary.id,
                similarity = best_score,
                "Recorded duplicate"
            );

            if let Some(cluster_id) = primary.topic_cluster_id {
                self.articles
                    .assign_cluster(article_id, Some(cluster_id), Some(best_score))
                    .await?;
                return Ok(Some(cluster_id));
            }
        }

        let best_cluster = self
            .clusters
            .list_active_with_centroids()
            .await?
            .into_iter()
            .filter_map(|c| {
                let similarity = cosine_similarity(&embedding, c.centroid_embedding.as_deref()?);
                Some((c, similarity))
            })
            .filter(|(_, similarity)| *similarity > self.cluster_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        if let Some((cluster, similarity)) = best_cluster {
            tracing::info!(
                article_id,
                cluster_id = cluster.id,
                similarity,
                "Found matching cluster"
            );
            self.articles
                .assign_cluster(article_id, Some(cluster.id), Some(similarity))
                .await?;
            self.update_centroid(cluster.id).await?;
            return Ok(Some(cluster.id));
        }

        let cluster = self.create_cluster(&article, embedding).await?;
        Ok(Some(cluster.id))
    }

    async fn create_cluster(
        &self,
        article: &Article,
        embedding: Vec<f32>,
    ) -> Result<TopicCluster, AppError> {
        let name = if article.title.trim().is_empty() {
            format!("Topic {}", article.id)
        } else {
            truncate(&article.title, 100).to_string()
        };

        let mut base = truncate(&slugify(&name), 200).to_string();
        if base.is_empty() {
            base = format!("topic-{}", article.id);
        }
        let clusters = &self.clusters;
        let slug = unique_slug(&base, |s| async move { clusters.slug_exists(&s).await }).await?;

        let cluster = self
            .clusters
            .create(NewCluster {
                name,
                slug,
                primary_article_id: article.id,
                centroid_embedding: embedding,
            })
            .await?;

        self.articles
            .assign_cluster(article.id, Some(cluster.id), Some(1.0))
            .await?;

        tracing::info!(cluster_id = cluster.id, name = %cluster.name, "Created cluster");
        Ok(cluster)
    }

    /// Recomputes the centroid from up to 100 member embeddings.
    ///
    /// With at least three embedded members, the member closest to the new
    /// centroid becomes the primary article.
    pub async fn update_centroid(&self, cluster_id: i64) -> Result<(), AppError> {
        let members = self
            .articles
            .cluster_embeddings(cluster_id, CENTROID_SAMPLE)
            .await?;

        let vectors: Vec<Vec<f32>> = members.iter().map(|m| m.embedding.clone()).collect();
        let Some(centroid) = mean(&vectors) else {
            return Ok(());
        };

        let primary = if members.len() >= MIN_MEMBERS_FOR_PRIMARY {
            members
                .iter()
                .map(|m| (m.id, cosine_similarity(&m.embedding, &centroid)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
                .map(|(id, _)| id)
        } else {
            None
        };

        let article_count = self.articles.count_in_cluster(cluster_id).await?;
        self.clusters
            .update_centroid(
                cluster_id,
                centroid,
                i32::try_from(article_count).unwrap_or(i32::MAX),
                primary,
            )
            .await
    }

    /// Folds `source_id` into `target_id` and deactivates the source.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when both ids are equal and
    /// [`AppError::NotFound`] when either cluster is missing.
    pub async fn merge(
        &self,
        source_id: i64,
        target_id: i64,
        reason: &str,
    ) -> Result<ClusterMerge, AppError> {
        if source_id == target_id {
            return Err(AppError::bad_request(
                "Cannot merge a cluster into itself",
                json!({ "source_id": source_id, "target_id": target_id }),
            ));
        }

        let source = self.require_cluster(source_id).await?;
        let target = self.require_cluster(target_id).await?;

        let moved = self.articles.move_cluster(source.id, target.id).await?;
        let merge = self
            .clusters
            .record_merge(
                source.id,
                target.id,
                reason,
                i32::try_from(moved).unwrap_or(i32::MAX),
            )
            .await?;
        self.clusters.deactivate(source.id).await?;
        self.update_centroid(target.id).await?;

        tracing::info!(
            source = %source.name,
            target = %target.name,
            moved,
            "Merged clusters"
        );
        Ok(merge)
    }

    /// Refreshes the member count and priority score.
    ///
    /// An empty cluster keeps its previous priority.
    pub async fn update_statistics(&self, cluster_id: i64) -> Result<(), AppError> {
        let count = self.articles.count_in_cluster(cluster_id).await?;
        let article_count = i32::try_from(count).unwrap_or(i32::MAX);

        if count == 0 {
            return self
                .clusters
                .update_statistics(cluster_id, article_count, None)
                .await;
        }

        let since = Utc::now() - Duration::days(RECENT_DAYS);
        let recent = self
            .articles
            .count_recent_in_cluster(cluster_id, since)
            .await?;

        self.clusters
            .update_statistics(cluster_id, article_count, Some(priority_score(count, recent)))
            .await
    }

    /// Statistics for every active cluster. Returns how many were updated.
    pub async fn refresh_statistics(&self) -> Result<usize, AppError> {
        let clusters = self.clusters.list_active().await?;
        for cluster in &clusters {
            self.update_statistics(cluster.id).await?;
        }
        tracing::info!(count = clusters.len(), "Updated cluster statistics");
        Ok(clusters.len())
    }

    /// Recomputes centroids of every active cluster.
    pub async fn recompute_centroids(&self) -> Result<usize, AppError> {
        let clusters = self.clusters.list_active().await?;
        for cluster in &clusters {
            self.update_centroid(cluster.id).await?;
        }
        Ok(clusters.len())
    }

    /// `SummarizeCluster` for the highest-priority active clusters that have
    /// enough articles but no summary yet.
    pub async fn clusters_needing_summary(&self) -> Result<Vec<Task>, AppError> {
        let clusters = self
            .clusters
            .list_needing_summary(SUMMARY_MIN_ARTICLES, SUMMARY_BATCH)
            .await?;
        if !clusters.is_empty() {
            tracing::info!(count = clusters.len(), "Queueing clusters for summary generation");
        }
        Ok(clusters
            .into_iter()
            .map(|c| Task::SummarizeCluster {
                cluster_id: c.id,
                job_id: None,
            })
            .collect())
    }

    /// Deactivates empty clusters older than a week.
    pub async fn cleanup_empty(&self) -> Result<u64, AppError> {
        let cutoff = Utc::now() - Duration::days(EMPTY_CLUSTER_GRACE_DAYS);
        let count = self.clusters.deactivate_empty(cutoff).await?;
        if count > 0 {
            tracing::info!(count, "Deactivated empty clusters");
        }
        Ok(count)
    }

    pub async fn list(
        &self,
        filter: ClusterFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<TopicCluster>, i64), AppError> {
        tokio::try_join!(
            self.clusters.list(filter.clone(), offset, limit),
            self.clusters.count(filter)
        )
    }

    pub async fn get(&self, id: i64) -> Result<TopicCluster, AppError> {
        self.require_cluster(id).await
    }

    /// Members of a cluster, newest publication first.
    pub async fn articles(
        &self,
        cluster_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Article>, i64), AppError> {
        self.require_cluster(cluster_id).await?;
        tokio::try_join!(
            self.articles.list_in_cluster(cluster_id, offset, limit),
            self.articles.count_in_cluster(cluster_id)
        )
    }

    pub async fn update(&self, id: i64, patch: ClusterPatch) -> Result<TopicCluster, AppError> {
        self.clusters.update(id, patch).await
    }

    /// Deletes a cluster; its articles are detached.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        if !self.clusters.delete(id).await? {
            return Err(AppError::not_found("Cluster not found", json!({ "id": id })));
        }
        tracing::info!(cluster_id = id, "Deleted cluster");
        Ok(())
    }
}
