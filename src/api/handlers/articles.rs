//! Handlers for scraped articles.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};

use crate::api::dto::articles::{
    ARTICLE_ORDERING, ArticleDetail, ArticleItem, ArticleListQuery, SimilarQuery,
};
use crate::api::dto::pagination::{Paginated, non_blank, parse_ordering};
use crate::api::dto::tasks::{ProcessPendingResponse, TaskAccepted};
use crate::api::middleware::CurrentUser;
use crate::domain::repositories::ArticleFilter;
use crate::error::AppError;
use crate::state::AppState;

/// Lists articles. Public.
///
/// # Endpoint
///
/// `GET /api/articles`
///
/// # Query Parameters
///
/// - `scrape_status`, `topic_cluster`, `has_cluster`
/// - `publication`, `title`: case-insensitive substrings
/// - `published_after`, `published_before` (RFC 3339)
/// - `search`: title, body or URL
/// - `ordering`: `publication_date`, `created_at` or `word_count`
pub async fn article_list_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<ArticleListQuery>,
) -> Result<Json<Paginated<ArticleItem>>, AppError> {
    let (offset, limit) = params.pagination.offset_limit()?;

    let filter = ArticleFilter {
        scrape_status: params.scrape_status,
        topic_cluster_id: params.topic_cluster,
        publication: non_blank(params.publication),
        title: non_blank(params.title),
        has_cluster: params.has_cluster,
        published_after: params.published_after,
        published_before: params.published_before,
        search: non_blank(params.search),
        ordering: parse_ordering(params.ordering.as_deref(), ARTICLE_ORDERING)?,
    };

    let (articles, count) = state.analyst_service.list(filter, offset, limit).await?;

    Ok(Json(Paginated::new(
        articles.into_iter().map(ArticleItem::from).collect(),
        count,
        &params.pagination,
        &uri,
    )))
}

/// # Endpoint
///
/// `GET /api/articles/{id}`
pub async fn article_detail_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ArticleDetail>, AppError> {
    let (article, links) = state.analyst_service.get(id).await?;
    Ok(Json(ArticleDetail::new(article, links)))
}

/// Articles most similar to `article_id`, best match first. Public.
///
/// # Endpoint
///
/// `GET /api/articles/similar?article_id=..&threshold=0.85&limit=10`
///
/// # Errors
///
/// Returns 400 when `article_id` is missing or the article has no embedding.
pub async fn similar_articles_handler(
    State(state): State<AppState>,
    Query(params): Query<SimilarQuery>,
) -> Result<Json<Vec<ArticleItem>>, AppError> {
    let articles = state
        .cluster_service
        .similar_to(params.article_id, params.threshold(), params.limit())
        .await?;

    Ok(Json(articles.into_iter().map(ArticleItem::from).collect()))
}

/// # Endpoint
///
/// `POST /api/articles/{id}/rescrape`
pub async fn rescrape_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let task = state.analyst_service.rescrape(id).await?;
    let task_id = state.task_queue.enqueue(task)?;
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted::started(task_id))))
}

/// # Endpoint
///
/// `POST /api/articles/{id}/generate_summary`
pub async fn article_summary_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let task = state.analyst_service.request_summary(id).await?;
    let task_id = state.task_queue.enqueue(task)?;
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted::started(task_id))))
}

/// Queues a scrape batch for pending articles.
///
/// # Endpoint
///
/// `POST /api/articles/process_pending`
///
/// Responds with `{"status": "no_pending"}` when nothing is waiting. The
/// returned `task_id` is that of the first queued scrape.
pub async fn process_pending_handler(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<(StatusCode, Json<ProcessPendingResponse>), AppError> {
    let (pending_count, tasks) = state.analyst_service.process_pending().await?;
    if pending_count == 0 {
        return Ok((
            StatusCode::OK,
            Json(ProcessPendingResponse {
                status: "no_pending",
                task_id: None,
                pending_count: 0,
                queued: 0,
            }),
        ));
    }

    let mut task_id = None;
    let mut queued = 0;
    for task in tasks {
        match state.task_queue.enqueue(task) {
            Ok(id) => {
                task_id.get_or_insert(id);
                queued += 1;
            }
            Err(e) if task_id.is_none() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, queued, "Stopped queueing pending scrapes");
                break;
            }
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessPendingResponse {
            status: "started",
            task_id,
            pending_count,
            queued,
        }),
    ))
}
