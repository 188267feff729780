//! Repository trait for generation jobs.

use serde_json::Value;

use crate::domain::entities::{GenerationJob, JobStatus, JobType, NewJob};
use crate::error::AppError;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
}

/// Repository interface for generation jobs.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgJobRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, new_job: NewJob) -> Result<GenerationJob, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<GenerationJob>, AppError>;

    /// Sets `in_progress` and `started_at = now()`.
    async fn start(&self, id: i64) -> Result<(), AppError>;

    /// Sets `completed`, stores the output and links the post when given.
    async fn complete(
        &self,
        id: i64,
        output: Value,
        blog_post_id: Option<i64>,
    ) -> Result<(), AppError>;

    async fn fail(&self, id: i64, error_message: &str) -> Result<(), AppError>;

    async fn list(
        &self,
        user_id: i64,
        filter: JobFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, AppError>;

    async fn count(&self, user_id: i64, filter: JobFilter) -> Result<i64, AppError>;
}
