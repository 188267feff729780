//! Routes background tasks and periodic jobs to the services that run them.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::scheduler::PeriodicJob;
use crate::application::services::{
    AnalystService, ClusterService, CollectorService, CreatorService,
};
use crate::application::worker::TaskHandler;
use crate::domain::repositories::{
    ArticleRepository, ClusterRepository, EmailRepository, JobRepository, LinkRepository,
    PostRepository, UserRepository,
};
use crate::domain::task::Task;
use crate::error::AppError;

/// The Collector, Analyst and Creator wired together behind [`TaskHandler`].
pub struct Pipeline<U, E, L, A, C, P, J>
where
    U: UserRepository,
    E: EmailRepository,
    L: LinkRepository,
    A: ArticleRepository,
    C: ClusterRepository,
    P: PostRepository,
    J: JobRepository,
{
    collector: Arc<CollectorService<U, E, L, A>>,
    analyst: Arc<AnalystService<A, L>>,
    clusters: Arc<ClusterService<A, C>>,
    creator: Arc<CreatorService<A, C, P, J>>,
}

impl<U, E, L, A, C, P, J> Pipeline<U, E, L, A, C, P, J>
where
    U: UserRepository,
    E: EmailRepository,
    L: LinkRepository,
    A: ArticleRepository,
    C: ClusterRepository,
    P: PostRepository,
    J: JobRepository,
{
    pub fn new(
        collector: Arc<CollectorService<U, E, L, A>>,
        analyst: Arc<AnalystService<A, L>>,
        clusters: Arc<ClusterService<A, C>>,
        creator: Arc<CreatorService<A, C, P, J>>,
    ) -> Self {
        Self {
            collector,
            analyst,
            clusters,
            creator,
        }
    }
}

#[async_trait]
impl<U, E, L, A, C, P, J> TaskHandler for Pipeline<U, E, L, A, C, P, J>
where
    U: UserRepository + 'static,
    E: EmailRepository + 'static,
    L: LinkRepository + 'static,
    A: ArticleRepository + 'static,
    C: ClusterRepository + 'static,
    P: PostRepository + 'static,
    J: JobRepository + 'static,
{
    async fn handle(&self, task: &Task) -> Result<Vec<Task>, AppError> {
        match task {
            Task::FetchEmails { user_id, since } => {
                self.collector.sync_user(*user_id, *since).await
            }
            Task::ProcessEmail { email_id } => self.collector.process_email(*email_id).await,
            Task::ScrapeArticle { article_id } => self.analyst.scrape_article(*article_id).await,
            Task::GenerateEmbedding { article_id } => {
                self.analyst.generate_embedding(*article_id).await
            }
            Task::ClusterArticle { article_id } => {
                self.clusters.process_article(*article_id).await?;
                Ok(vec![])
            }
            Task::SummarizeArticle { article_id } => {
                self.analyst.summarize_article(*article_id).await?;
                Ok(vec![])
            }
            Task::SummarizeCluster { cluster_id, job_id } => {
                self.creator.summarize_cluster(*cluster_id, *job_id).await?;
                Ok(vec![])
            }
            Task::GenerateBlogPost {
                job_id,
                user_id,
                cluster_id,
                prompt,
                post_id,
            } => {
                self.creator
                    .generate_post(*job_id, *user_id, *cluster_id, prompt, *post_id)
                    .await?;
                Ok(vec![])
            }
            Task::GenerateImage {
                job_id,
                post_id,
                prompt,
            } => {
                self.creator.generate_image(*job_id, *post_id, prompt).await?;
                Ok(vec![])
            }
        }
    }

    async fn run_periodic(&self, job: PeriodicJob) -> Result<Vec<Task>, AppError> {
        match job {
            PeriodicJob::FetchAllUsers => self.collector.sync_all_users().await,
            PeriodicJob::ScrapePending => self.analyst.scrape_pending().await,
            PeriodicJob::RetryFailed => self.analyst.retry_failed().await,
            PeriodicJob::EmbedMissing => self.analyst.embed_missing().await,
            PeriodicJob::ClusterStatistics => {
                self.clusters.refresh_statistics().await?;
                Ok(vec![])
            }
            PeriodicJob::ClusterSummaries => self.clusters.clusters_needing_summary().await,
            PeriodicJob::CleanupEmptyClusters => {
                self.clusters.cleanup_empty().await?;
                Ok(vec![])
            }
        }
    }

    async fn on_failure(&self, task: &Task, error: &AppError) {
        let Some(job_id) = task.job_id() else {
            return;
        };
        if let Err(e) = self.creator.fail_job(job_id, &error.to_string()).await {
            tracing::error!(job_id, error = %e, "Failed to record job failure");
        }
    }
}
