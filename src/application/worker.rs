//! In-process task queue and the worker that drains it.
//!
//! Handlers and the scheduler push [`Task`]s through a [`TaskQueue`]; the
//! worker runs up to `concurrency` attempts at once, retries transient
//! failures per [`Task::retry_policy`] and feeds follow-up tasks back into the
//! same queue. A task waiting out a retry delay does not hold a slot.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use uuid::Uuid;

use crate::application::scheduler::PeriodicJob;
use crate::domain::task::{RetryPolicy, Task, TaskEnvelope};
use crate::error::AppError;

/// Producer side of the bounded task channel.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<TaskEnvelope>,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TaskEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueues a task and returns the id reported to clients.
    ///
    /// Never waits: a full or closed queue is reported as 503.
    pub fn enqueue(&self, task: Task) -> Result<Uuid, AppError> {
        let name = task.name();
        let envelope = TaskEnvelope::new(task);
        let id = envelope.id;

        match self.tx.try_send(envelope) {
            Ok(()) => {
                metrics::counter!("tasks_enqueued_total", "task" => name).increment(1);
                tracing::debug!(task = name, task_id = %id, "Task enqueued");
                Ok(id)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::counter!("tasks_dropped_total", "task" => name).increment(1);
                Err(AppError::unavailable(
                    "Task queue is full",
                    json!({ "task": name }),
                ))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(AppError::unavailable(
                "Task queue is closed",
                json!({ "task": name }),
            )),
        }
    }

    /// Enqueues follow-up work; tasks that do not fit are logged and dropped.
    ///
    /// The scheduler's batch jobs pick up anything lost here.
    pub fn enqueue_all(&self, tasks: Vec<Task>) -> usize {
        let mut queued = 0;
        for task in tasks {
            let name = task.name();
            match self.enqueue(task) {
                Ok(_) => queued += 1,
                Err(e) => tracing::warn!(task = name, error = %e, "Follow-up task dropped"),
            }
        }
        queued
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free slots left in the channel.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Executes tasks on behalf of the worker and the scheduler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Runs one attempt of a task and returns its follow-ups.
    async fn handle(&self, task: &Task) -> Result<Vec<Task>, AppError>;

    /// Runs a periodic batch job and returns the tasks it produced.
    async fn run_periodic(&self, job: PeriodicJob) -> Result<Vec<Task>, AppError>;

    /// Called once a task has failed for good.
    async fn on_failure(&self, task: &Task, error: &AppError);
}

/// Drains the queue; runs until the channel closes or the task is aborted.
pub async fn run_task_worker<H>(
    mut rx: mpsc::Receiver<TaskEnvelope>,
    handler: Arc<H>,
    queue: TaskQueue,
    concurrency: usize,
) where
    H: TaskHandler + ?Sized + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    tracing::info!(concurrency, "Task worker started");

    while let Some(envelope) = rx.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let handler = handler.clone();
        let queue = queue.clone();
        let semaphore = semaphore.clone();

        tokio::spawn(async move {
            let policy = envelope.task.retry_policy();
            execute(handler.as_ref(), &queue, envelope, policy, &semaphore, permit).await;
        });
    }

    tracing::info!("Task worker stopped");
}

/// Runs one envelope to completion under `policy`.
///
/// `permit` covers the first attempt; later attempts take a fresh slot from
/// `semaphore` once their retry delay has elapsed.
pub(crate) async fn execute<H>(
    handler: &H,
    queue: &TaskQueue,
    envelope: TaskEnvelope,
    policy: RetryPolicy,
    semaphore: &Arc<Semaphore>,
    permit: OwnedSemaphorePermit,
) -> bool
where
    H: TaskHandler + ?Sized,
{
    let task = &envelope.task;
    let name = task.name();
    let started = Instant::now();
    let strategy = FixedInterval::new(policy.delay).take(policy.max_retries);
    let first_permit = &Mutex::new(Some(permit));

    let result = RetryIf::start(
        strategy,
        move || async move {
            let held = first_permit.lock().await.take();
            let _permit = match held {
                Some(permit) => permit,
                None => semaphore.clone().acquire_owned().await.map_err(|_| {
                    AppError::unavailable("Task worker stopped", json!({ "task": name }))
                })?,
            };
            handler.handle(task).await
        },
        |e: &AppError| {
            let retry = e.is_transient();
            if retry {
                tracing::warn!(task = name, task_id = %envelope.id, error = %e, "Task attempt failed, retrying");
            }
            retry
        },
    )
    .await;

    let elapsed = started.elapsed().as_secs_f64();
    metrics::histogram!("task_duration_seconds", "task" => name).record(elapsed);

    match result {
        Ok(follow_ups) => {
            metrics::counter!("tasks_completed_total", "task" => name).increment(1);
            tracing::info!(
                task = name,
                task_id = %envelope.id,
                follow_ups = follow_ups.len(),
                elapsed_secs = elapsed,
                "Task completed"
            );
            queue.enqueue_all(follow_ups);
            true
        }
        Err(e) => {
            metrics::counter!("tasks_failed_total", "task" => name).increment(1);
            tracing::error!(task = name, task_id = %envelope.id, error = %e, "Task failed");
            handler.on_failure(task, &e).await;
            false
        }
    }
}
