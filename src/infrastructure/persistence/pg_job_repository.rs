//! PostgreSQL implementation of generation-job repository.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use crate::domain::entities::{GenerationJob, JobStatus, JobType, NewJob};
use crate::domain::repositories::{JobFilter, JobRepository};
use crate::error::AppError;

const JOB_COLUMNS: &str = "id, user_id, job_type, status, blog_post_id, cluster_id, input_data, \
     output_data, error_message, started_at, completed_at, created_at, updated_at";

/// PostgreSQL repository for generation jobs.
pub struct PgJobRepository {
    pool: Arc<PgPool>,
}

impl PgJobRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn filtered(select: &str, user_id: i64, filter: &JobFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM generation_jobs WHERE user_id = ")
        .push_bind(user_id);

    if let Some(job_type) = filter.job_type {
        qb.push(" AND job_type = ").push_bind(job_type);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }

    qb
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, new_job: NewJob) -> Result<GenerationJob, AppError> {
        let job = sqlx::query_as!(
            GenerationJob,
            r#"
            INSERT INTO generation_jobs (user_id, job_type, blog_post_id, cluster_id, input_data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, job_type AS "job_type: JobType", status AS "status: JobStatus",
                      blog_post_id, cluster_id, input_data, output_data, error_message,
                      started_at, completed_at, created_at, updated_at
            "#,
            new_job.user_id,
            new_job.job_type as JobType,
            new_job.blog_post_id,
            new_job.cluster_id,
            new_job.input_data
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(job)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GenerationJob>, AppError> {
        let job = sqlx::query_as!(
            GenerationJob,
            r#"
            SELECT id, user_id, job_type AS "job_type: JobType", status AS "status: JobStatus",
                   blog_post_id, cluster_id, input_data, output_data, error_message,
                   started_at, completed_at, created_at, updated_at
            FROM generation_jobs
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(job)
    }

    async fn start(&self, id: i64) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE generation_jobs
            SET status = 'in_progress', started_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
            id
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn complete(
        &self,
        id: i64,
        output: Value,
        blog_post_id: Option<i64>,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE generation_jobs
            SET status = 'completed',
                output_data = $2,
                blog_post_id = COALESCE($3, blog_post_id),
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            output,
            blog_post_id
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn fail(&self, id: i64, error_message: &str) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE generation_jobs
            SET status = 'failed', error_message = $2, completed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            error_message
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        user_id: i64,
        filter: JobFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, AppError> {
        let mut qb = filtered(&format!("SELECT {JOB_COLUMNS}"), user_id, &filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let jobs = qb
            .build_query_as::<GenerationJob>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(jobs)
    }

    async fn count(&self, user_id: i64, filter: JobFilter) -> Result<i64, AppError> {
        let count = filtered("SELECT COUNT(*)", user_id, &filter)
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}
