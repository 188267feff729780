//! Generation job tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    BlogPost,
    ClusterSummary,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A user-visible record of one AI generation request.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GenerationJob {
    pub id: i64,
    pub user_id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub blog_post_id: Option<i64>,
    pub cluster_id: Option<i64>,
    pub input_data: Value,
    pub output_data: Value,
    pub error_message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Wall-clock duration in seconds, once both endpoints are known.
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: i64,
    pub job_type: JobType,
    pub blog_post_id: Option<i64>,
    pub cluster_id: Option<i64>,
    pub input_data: Value,
}

#[cfg(test)]
pub(crate) fn test_job(id: i64, user_id: i64, job_type: JobType) -> GenerationJob {
    GenerationJob {
        id,
        user_id,
        job_type,
        status: JobStatus::Pending,
        blog_post_id: None,
        cluster_id: None,
        input_data: Value::Object(Default::default()),
        output_data: Value::Object(Default::default()),
        error_message: String::new(),
        started_at: None,
        completed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
