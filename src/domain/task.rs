//! Background task model.
//!
//! API handlers and the scheduler enqueue [`Task`]s; the worker in
//! [`crate::application::worker`] executes them with a per-kind retry policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    /// Pull new newsletter messages for one user.
    FetchEmails {
        user_id: i64,
        since: Option<DateTime<Utc>>,
    },
    /// Extract links from a stored email and register articles.
    ProcessEmail { email_id: i64 },
    ScrapeArticle { article_id: i64 },
    GenerateEmbedding { article_id: i64 },
    /// Deduplicate and assign a cluster.
    ClusterArticle { article_id: i64 },
    SummarizeArticle { article_id: i64 },
    SummarizeCluster {
        cluster_id: i64,
        job_id: Option<i64>,
    },
    GenerateBlogPost {
        job_id: i64,
        user_id: i64,
        cluster_id: i64,
        prompt: String,
        post_id: Option<i64>,
    },
    GenerateImage {
        job_id: i64,
        post_id: i64,
        prompt: String,
    },
}

/// How often and how patiently a task is retried after a transient error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    const fn new(max_retries: usize, delay_secs: u64) -> Self {
        Self {
            max_retries,
            delay: Duration::from_secs(delay_secs),
        }
    }
}

impl Task {
    /// Stable name used in logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Task::FetchEmails { .. } => "fetch_emails",
            Task::ProcessEmail { .. } => "process_email",
            Task::ScrapeArticle { .. } => "scrape_article",
            Task::GenerateEmbedding { .. } => "generate_embedding",
            Task::ClusterArticle { .. } => "cluster_article",
            Task::SummarizeArticle { .. } => "summarize_article",
            Task::SummarizeCluster { .. } => "summarize_cluster",
            Task::GenerateBlogPost { .. } => "generate_blog_post",
            Task::GenerateImage { .. } => "generate_image",
        }
    }

    /// The generation job tracking this task, if any.
    pub fn job_id(&self) -> Option<i64> {
        match self {
            Task::SummarizeCluster { job_id, .. } => *job_id,
            Task::GenerateBlogPost { job_id, .. } | Task::GenerateImage { job_id, .. } => {
                Some(*job_id)
            }
            _ => None,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Task::FetchEmails { .. } => RetryPolicy::new(3, 60),
            Task::ProcessEmail { .. } => RetryPolicy::new(3, 30),
            Task::ScrapeArticle { .. } => RetryPolicy::new(3, 120),
            Task::GenerateEmbedding { .. } => RetryPolicy::new(3, 60),
            Task::ClusterArticle { .. } => RetryPolicy::new(2, 30),
            Task::SummarizeArticle { .. } => RetryPolicy::new(2, 60),
            Task::SummarizeCluster { .. } => RetryPolicy::new(2, 60),
            Task::GenerateBlogPost { .. } => RetryPolicy::new(2, 120),
            Task::GenerateImage { .. } => RetryPolicy::new(2, 60),
        }
    }
}

/// A task with the id reported back to API clients.
#[derive(Debug, Clone)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub task: Task,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn new(task: Task) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policies() {
        let scrape = Task::ScrapeArticle { article_id: 1 }.retry_policy();
        assert_eq!(scrape.max_retries, 3);
        assert_eq!(scrape.delay, Duration::from_secs(120));

        let cluster = Task::ClusterArticle { article_id: 1 }.retry_policy();
        assert_eq!(cluster.max_retries, 2);
        assert_eq!(cluster.delay, Duration::from_secs(30));
    }

    #[test]
    fn test_job_id() {
        assert_eq!(Task::ScrapeArticle { article_id: 1 }.job_id(), None);
        assert_eq!(
            Task::SummarizeCluster {
                cluster_id: 1,
                job_id: None
            }
            .job_id(),
            None
        );
        let image = Task::GenerateImage {
            job_id: 7,
            post_id: 1,
            prompt: String::new(),
        };
        assert_eq!(image.job_id(), Some(7));
    }

    #[test]
    fn test_task_serializes_with_type_tag() {
        let json = serde_json::to_value(Task::ProcessEmail { email_id: 9 }).unwrap();
        assert_eq!(json["type"], "process_email");
        assert_eq!(json["email_id"], 9);
    }

    #[test]
    fn test_envelopes_get_distinct_ids() {
        let a = TaskEnvelope::new(Task::ScrapeArticle { article_id: 1 });
        let b = TaskEnvelope::new(Task::ScrapeArticle { article_id: 1 });
        assert_ne!(a.id, b.id);
    }
}
