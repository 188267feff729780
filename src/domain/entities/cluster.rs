//! Topic clusters grouping similar articles.

use chrono::{DateTime, Utc};

/// A group of articles about the same story.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicCluster {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub primary_article_id: Option<i64>,
    pub centroid_embedding: Option<Vec<f32>>,
    pub article_count: i32,
    pub priority_score: f64,
    pub master_summary: String,
    pub summary_generated_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_article_added_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input data for seeding a cluster from its first article.
#[derive(Debug, Clone)]
pub struct NewCluster {
    pub name: String,
    pub slug: String,
    pub primary_article_id: i64,
    pub centroid_embedding: Vec<f32>,
}

/// Editable cluster fields. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ClusterPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Audit record of one cluster being folded into another.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClusterMerge {
    pub id: i64,
    pub source_cluster_id: Option<i64>,
    pub target_cluster_id: i64,
    pub reason: String,
    pub articles_moved: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) fn test_cluster(id: i64, centroid: Vec<f32>) -> TopicCluster {
    TopicCluster {
        id,
        name: format!("Cluster {id}"),
        slug: format!("cluster-{id}"),
        description: String::new(),
        primary_article_id: None,
        centroid_embedding: Some(centroid),
        article_count: 1,
        priority_score: 0.0,
        master_summary: String::new(),
        summary_generated_at: None,
        is_active: true,
        last_article_added_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
