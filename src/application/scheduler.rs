//! Periodic batch jobs.
//!
//! Each [`PeriodicJob`] runs on its own ticker. A job's output tasks go onto
//! the regular [`TaskQueue`], so heavy work still runs under the worker's
//! concurrency limit and retry policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::application::worker::{TaskHandler, TaskQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicJob {
    /// Queue a mail sync for every Gmail-connected user.
    FetchAllUsers,
    ScrapePending,
    RetryFailed,
    EmbedMissing,
    ClusterStatistics,
    /// Summaries for clusters that gained articles.
    ClusterSummaries,
    CleanupEmptyClusters,
}

impl PeriodicJob {
    pub const ALL: [PeriodicJob; 7] = [
        PeriodicJob::FetchAllUsers,
        PeriodicJob::ScrapePending,
        PeriodicJob::RetryFailed,
        PeriodicJob::EmbedMissing,
        PeriodicJob::ClusterStatistics,
        PeriodicJob::ClusterSummaries,
        PeriodicJob::CleanupEmptyClusters,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PeriodicJob::FetchAllUsers => "fetch_all_users",
            PeriodicJob::ScrapePending => "scrape_pending",
            PeriodicJob::RetryFailed => "retry_failed",
            PeriodicJob::EmbedMissing => "embed_missing",
            PeriodicJob::ClusterStatistics => "cluster_statistics",
            PeriodicJob::ClusterSummaries => "cluster_summaries",
            PeriodicJob::CleanupEmptyClusters => "cleanup_empty_clusters",
        }
    }

    pub fn period(self) -> Duration {
        let minutes = match self {
            PeriodicJob::FetchAllUsers => 30,
            PeriodicJob::ScrapePending => 5,
            PeriodicJob::RetryFailed => 60,
            PeriodicJob::EmbedMissing => 10,
            PeriodicJob::ClusterStatistics => 60,
            PeriodicJob::ClusterSummaries => 120,
            PeriodicJob::CleanupEmptyClusters => 24 * 60,
        };
        Duration::from_secs(minutes * 60)
    }
}

/// Runs a job once and queues what it produced.
pub async fn run_once<H>(handler: &H, queue: &TaskQueue, job: PeriodicJob) -> usize
where
    H: TaskHandler + ?Sized,
{
    match handler.run_periodic(job).await {
        Ok(tasks) => {
            let produced = tasks.len();
            let queued = queue.enqueue_all(tasks);
            metrics::counter!("scheduler_runs_total", "job" => job.name()).increment(1);
            tracing::info!(job = job.name(), produced, queued, "Periodic job finished");
            queued
        }
        Err(e) => {
            metrics::counter!("scheduler_failures_total", "job" => job.name()).increment(1);
            tracing::error!(job = job.name(), error = %e, "Periodic job failed");
            0
        }
    }
}

/// Spawns one ticker per job. The first tick of each fires after one period.
pub fn spawn_scheduler<H>(handler: Arc<H>, queue: TaskQueue) -> Vec<JoinHandle<()>>
where
    H: TaskHandler + ?Sized + 'static,
{
    PeriodicJob::ALL
        .into_iter()
        .map(|job| {
            let handler = handler.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut ticker = interval(job.period());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // interval() completes its first tick immediately
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    run_once(handler.as_ref(), &queue, job).await;
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::MockTaskHandler;
    use crate::domain::task::Task;
    use crate::error::AppError;
    use serde_json::json;

    #[test]
    fn test_periods() {
        assert_eq!(
            PeriodicJob::ScrapePending.period(),
            Duration::from_secs(300)
        );
        assert_eq!(
            PeriodicJob::ClusterSummaries.period(),
            Duration::from_secs(7200)
        );
        assert_eq!(
            PeriodicJob::CleanupEmptyClusters.period(),
            Duration::from_secs(86_400)
        );
    }

    #[tokio::test]
    async fn test_run_once_queues_produced_tasks() {
        let (queue, mut rx) = TaskQueue::new(8);
        let mut handler = MockTaskHandler::new();
        handler
            .expect_run_periodic()
            .withf(|job| *job == PeriodicJob::FetchAllUsers)
            .times(1)
            .returning(|_| {
                Ok(vec![
                    Task::FetchEmails {
                        user_id: 1,
                        since: None,
                    },
                    Task::FetchEmails {
                        user_id: 2,
                        since: None,
                    },
                ])
            });

        let queued = run_once(&handler, &queue, PeriodicJob::FetchAllUsers).await;
        assert_eq!(queued, 2);
        assert!(matches!(
            rx.try_recv().unwrap().task,
            Task::FetchEmails { user_id: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_run_once_swallows_errors() {
        let (queue, mut rx) = TaskQueue::new(8);
        let mut handler = MockTaskHandler::new();
        handler
            .expect_run_periodic()
            .returning(|_| Err(AppError::internal("Database error", json!({}))));

        let queued = run_once(&handler, &queue, PeriodicJob::RetryFailed).await;
        assert_eq!(queued, 0);
        assert!(rx.try_recv().is_err());
    }
}
