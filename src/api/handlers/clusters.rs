//! Handlers for topic clusters.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::api::dto::articles::ArticleItem;
use crate::api::dto::clusters::{
    CLUSTER_ORDERING, ClusterItem, ClusterListQuery, GenerationPromptRequest, MergeClusterRequest,
    MergeResponse, UpdateClusterRequest,
};
use crate::api::dto::pagination::{Paginated, PaginationParams, non_blank, parse_ordering};
use crate::api::dto::tasks::{PostGenerationAccepted, TaskAccepted};
use crate::api::middleware::CurrentUser;
use crate::domain::entities::ClusterPatch;
use crate::domain::repositories::ClusterFilter;
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_MERGE_REASON: &str = "manual";

/// Lists clusters. Public.
///
/// # Endpoint
///
/// `GET /api/clusters`
///
/// # Query Parameters
///
/// - `is_active`
/// - `search`: name, description or summary
/// - `ordering`: `priority_score`, `article_count` or `created_at`
pub async fn cluster_list_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<ClusterListQuery>,
) -> Result<Json<Paginated<ClusterItem>>, AppError> {
    let (offset, limit) = params.pagination.offset_limit()?;

    let filter = ClusterFilter {
        is_active: params.is_active,
        search: non_blank(params.search),
        ordering: parse_ordering(params.ordering.as_deref(), CLUSTER_ORDERING)?,
    };

    let (clusters, count) = state.cluster_service.list(filter, offset, limit).await?;

    Ok(Json(Paginated::new(
        clusters.into_iter().map(ClusterItem::from).collect(),
        count,
        &params.pagination,
        &uri,
    )))
}

/// # Endpoint
///
/// `GET /api/clusters/{id}`
pub async fn cluster_detail_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ClusterItem>, AppError> {
    let cluster = state.cluster_service.get(id).await?;
    Ok(Json(cluster.into()))
}

/// Paginated members of a cluster. Public.
///
/// # Endpoint
///
/// `GET /api/clusters/{id}/articles`
pub async fn cluster_articles_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<ArticleItem>>, AppError> {
    let (offset, limit) = params.offset_limit()?;
    let (articles, count) = state.cluster_service.articles(id, offset, limit).await?;

    Ok(Json(Paginated::new(
        articles.into_iter().map(ArticleItem::from).collect(),
        count,
        &params,
        &uri,
    )))
}

/// # Endpoint
///
/// `PATCH /api/clusters/{id}`
pub async fn update_cluster_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateClusterRequest>,
) -> Result<Json<ClusterItem>, AppError> {
    payload.validate()?;

    let patch = ClusterPatch {
        name: payload.name,
        description: payload.description,
        is_active: payload.is_active,
    };
    let cluster = state.cluster_service.update(id, patch).await?;
    Ok(Json(cluster.into()))
}

/// Deletes a cluster; its articles become unclustered.
///
/// # Endpoint
///
/// `DELETE /api/clusters/{id}`
pub async fn delete_cluster_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.cluster_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Queues a master summary for the cluster and records a job for it.
///
/// # Endpoint
///
/// `POST /api/clusters/{id}/generate_summary`
pub async fn cluster_summary_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let task = state
        .creator_service
        .request_cluster_summary(&user, id)
        .await?;
    let job_id = task.job_id();
    let task_id = state.task_queue.enqueue(task)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskAccepted::started(task_id).with_job(job_id)),
    ))
}

/// Creates a `Draft: <cluster name>` post and queues its generation.
///
/// # Endpoint
///
/// `POST /api/clusters/{id}/generate_post`
///
/// # Errors
///
/// Returns 400 when the cluster has fewer than two articles.
pub async fn cluster_post_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    payload: Option<Json<GenerationPromptRequest>>,
) -> Result<(StatusCode, Json<PostGenerationAccepted>), AppError> {
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;

    let (task, post_id) = state
        .creator_service
        .request_post_from_cluster(&user, id, &payload.custom_prompt)
        .await?;
    let job_id = task.job_id();
    let task_id = state.task_queue.enqueue(task)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PostGenerationAccepted {
            task_id,
            post_id,
            job_id,
            status: "started",
        }),
    ))
}

/// Merges this cluster into `target_id`.
///
/// # Endpoint
///
/// `POST /api/clusters/{id}/merge`
///
/// # Request Body
///
/// ```json
/// { "target_id": 7, "reason": "same story" }
/// ```
///
/// # Errors
///
/// Returns 400 when merging a cluster into itself and 404 when either
/// cluster is missing.
pub async fn merge_cluster_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<MergeClusterRequest>,
) -> Result<Json<MergeResponse>, AppError> {
    payload.validate()?;

    let reason = match payload.reason.trim() {
        "" => DEFAULT_MERGE_REASON,
        r => r,
    };
    let merge = state
        .cluster_service
        .merge(id, payload.target_id, reason)
        .await?;
    Ok(Json(merge.into()))
}
