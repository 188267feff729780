//! Handlers for blog posts and their generation jobs.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::pagination::{Paginated, non_blank, parse_ordering};
use crate::api::dto::posts::{
    CreatePostRequest, GenerateImageRequest, GeneratePostRequest, JobItem, JobListQuery,
    POST_ORDERING, PostItem, PostListQuery, PostResponse, UpdatePostRequest,
};
use crate::api::dto::tasks::TaskAccepted;
use crate::api::middleware::CurrentUser;
use crate::domain::repositories::{JobFilter, PostFilter};
use crate::error::AppError;
use crate::state::AppState;

/// Lists the caller's posts.
///
/// # Endpoint
///
/// `GET /api/posts`
///
/// # Query Parameters
///
/// - `status`: `draft`, `review`, `published` or `archived`
/// - `source_cluster`
/// - `search`: title, body or excerpt
/// - `ordering`: `created_at`, `updated_at`, `published_at` or `title`
pub async fn post_list_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PostListQuery>,
) -> Result<Json<Paginated<PostItem>>, AppError> {
    let (offset, limit) = params.pagination.offset_limit()?;

    let filter = PostFilter {
        status: params.status,
        source_cluster_id: params.source_cluster,
        search: non_blank(params.search),
        ordering: parse_ordering(params.ordering.as_deref(), POST_ORDERING)?,
    };

    let (posts, count) = state
        .creator_service
        .list_posts(&user, filter, offset, limit)
        .await?;

    Ok(Json(Paginated::new(
        posts.into_iter().map(PostItem::from).collect(),
        count,
        &params.pagination,
        &uri,
    )))
}

/// Creates a manual post. The slug is derived from the title.
///
/// # Endpoint
///
/// `POST /api/posts`
///
/// # Request Body
///
/// ```json
/// { "title": "Weekly digest", "content_markdown": "...", "status": "draft" }
/// ```
///
/// # Responses
///
/// - `201 Created`
/// - `400 Bad Request`: invalid fields
/// - `404 Not Found`: unknown `source_cluster_id`
pub async fn create_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    payload.validate()?;

    let post = state
        .creator_service
        .create_post(&user, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// A post with its images and source articles.
///
/// # Endpoint
///
/// `GET /api/posts/{id}`
pub async fn post_detail_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, AppError> {
    let detail = state.creator_service.get_post(&user, id).await?;
    Ok(Json(detail.into()))
}

/// # Endpoint
///
/// `PATCH /api/posts/{id}`
pub async fn update_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    payload.validate()?;

    let post = state
        .creator_service
        .update_post(&user, id, payload.into())
        .await?;
    Ok(Json(post.into()))
}

/// # Endpoint
///
/// `DELETE /api/posts/{id}`
pub async fn delete_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.creator_service.delete_post(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Queues generation of a new post from a cluster.
///
/// # Endpoint
///
/// `POST /api/posts/generate`
///
/// # Errors
///
/// Returns 400 when `cluster_id` is missing.
pub async fn generate_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<GeneratePostRequest>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    payload.validate()?;
    let cluster_id = payload
        .cluster_id
        .ok_or_else(|| AppError::bad_request("cluster_id is required", json!({})))?;

    let task = state
        .creator_service
        .request_post(&user, cluster_id, &payload.custom_prompt)
        .await?;
    let job_id = task.job_id();
    let task_id = state.task_queue.enqueue(task)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskAccepted::started(task_id).with_job(job_id)),
    ))
}

/// # Endpoint
///
/// `POST /api/posts/{id}/publish`
pub async fn publish_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, AppError> {
    let post = state.creator_service.publish(&user, id).await?;
    Ok(Json(post.into()))
}

/// Queues a header image. Without a prompt one is derived from the post.
///
/// # Endpoint
///
/// `POST /api/posts/{id}/generate_image`
pub async fn generate_image_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    payload: Option<Json<GenerateImageRequest>>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;

    let task = state
        .creator_service
        .request_image(&user, id, &payload.prompt)
        .await?;
    let job_id = task.job_id();
    let task_id = state.task_queue.enqueue(task)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskAccepted::started(task_id).with_job(job_id)),
    ))
}

/// Lists the caller's generation jobs.
///
/// # Endpoint
///
/// `GET /api/jobs`
pub async fn job_list_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<JobListQuery>,
) -> Result<Json<Paginated<JobItem>>, AppError> {
    let (offset, limit) = params.pagination.offset_limit()?;

    let filter = JobFilter {
        job_type: params.job_type,
        status: params.status,
    };

    let (jobs, count) = state
        .creator_service
        .list_jobs(&user, filter, offset, limit)
        .await?;

    Ok(Json(Paginated::new(
        jobs.into_iter().map(JobItem::from).collect(),
        count,
        &params.pagination,
        &uri,
    )))
}

/// # Endpoint
///
/// `GET /api/jobs/{id}`
pub async fn job_detail_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<JobItem>, AppError> {
    let job = state.creator_service.get_job(&user, id).await?;
    Ok(Json(job.into()))
}
