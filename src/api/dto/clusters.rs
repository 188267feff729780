//! DTOs for topic clusters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use super::pagination::PaginationParams;
use crate::domain::entities::{ClusterMerge, TopicCluster};

pub const CLUSTER_ORDERING: &[&str] = &["priority_score", "article_count", "created_at"];

/// `GET /api/clusters` query.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct ClusterListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClusterItem {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub primary_article_id: Option<i64>,
    pub article_count: i32,
    pub priority_score: f64,
    pub master_summary: String,
    pub summary_generated_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_article_added_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TopicCluster> for ClusterItem {
    fn from(c: TopicCluster) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            primary_article_id: c.primary_article_id,
            article_count: c.article_count,
            priority_score: c.priority_score,
            master_summary: c.master_summary,
            summary_generated_at: c.summary_generated_at,
            is_active: c.is_active,
            last_article_added_at: c.last_article_added_at,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// `PATCH /api/clusters/{id}` body.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClusterRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// `POST /api/clusters/{id}/merge` body.
#[derive(Debug, Deserialize, Validate)]
pub struct MergeClusterRequest {
    pub target_id: i64,
    #[serde(default)]
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub id: i64,
    pub source_cluster_id: Option<i64>,
    pub target_cluster_id: i64,
    pub reason: String,
    pub articles_moved: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ClusterMerge> for MergeResponse {
    fn from(m: ClusterMerge) -> Self {
        Self {
            id: m.id,
            source_cluster_id: m.source_cluster_id,
            target_cluster_id: m.target_cluster_id,
            reason: m.reason,
            articles_moved: m.articles_moved,
            created_at: m.created_at,
        }
    }
}

/// Optional body of the generation actions.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerationPromptRequest {
    #[serde(default)]
    #[validate(length(max = 4000, message = "Prompt must be at most 4000 characters"))]
    pub custom_prompt: String,
}
