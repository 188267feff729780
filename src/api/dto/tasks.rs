//! Responses of endpoints that hand work to the background queue.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct TaskAccepted {
    pub task_id: Uuid,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i64>,
}

impl TaskAccepted {
    pub fn started(task_id: Uuid) -> Self {
        Self {
            task_id,
            status: "started",
            job_id: None,
        }
    }

    pub fn with_job(mut self, job_id: Option<i64>) -> Self {
        self.job_id = job_id;
        self
    }
}

/// `POST /api/clusters/{id}/generate_post` response.
#[derive(Debug, Serialize)]
pub struct PostGenerationAccepted {
    pub task_id: Uuid,
    pub post_id: i64,
    pub job_id: Option<i64>,
    pub status: &'static str,
}

/// `POST /api/articles/process_pending` response.
#[derive(Debug, Serialize)]
pub struct ProcessPendingResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    pub pending_count: i64,
    pub queued: usize,
}
