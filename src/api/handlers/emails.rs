//! Handlers for newsletter emails and extracted links.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use serde_json::json;

use crate::api::dto::emails::{
    EMAIL_ORDERING, EmailDetail, EmailItem, EmailListQuery, EmailSummaryResponse, LinkItem,
    LinkListQuery,
};
use crate::api::dto::pagination::{Paginated, non_blank, parse_ordering};
use crate::api::dto::tasks::TaskAccepted;
use crate::api::middleware::CurrentUser;
use crate::domain::repositories::{EmailFilter, LinkFilter};
use crate::domain::task::Task;
use crate::error::AppError;
use crate::state::AppState;

/// Lists the caller's newsletter emails.
///
/// # Endpoint
///
/// `GET /api/emails`
///
/// # Query Parameters
///
/// - `page`, `page_size`
/// - `is_processed`, `sender`, `subject`
/// - `received_after`, `received_before` (RFC 3339)
/// - `search`: subject, sender or snippet
/// - `ordering`: `received_date` or `created_at`, `-` prefix for descending
pub async fn email_list_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<EmailListQuery>,
) -> Result<Json<Paginated<EmailItem>>, AppError> {
    let (offset, limit) = params.pagination.offset_limit()?;

    let filter = EmailFilter {
        is_processed: params.is_processed,
        sender: non_blank(params.sender),
        subject: non_blank(params.subject),
        received_after: params.received_after,
        received_before: params.received_before,
        search: non_blank(params.search),
        ordering: parse_ordering(params.ordering.as_deref(), EMAIL_ORDERING)?,
    };

    let (emails, count) = state
        .collector_service
        .list_emails(&user, filter, offset, limit)
        .await?;

    Ok(Json(Paginated::new(
        emails.into_iter().map(EmailItem::from).collect(),
        count,
        &params.pagination,
        &uri,
    )))
}

/// An email with its HTML body, summary and extracted links.
///
/// # Endpoint
///
/// `GET /api/emails/{id}`
pub async fn email_detail_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<EmailDetail>, AppError> {
    let (email, links) = state.collector_service.get_email(&user, id).await?;
    Ok(Json(EmailDetail::new(email, links)))
}

/// Queues a Gmail sync for the caller.
///
/// # Endpoint
///
/// `POST /api/emails/sync`
///
/// # Errors
///
/// Returns 400 if Gmail is not connected and 503 if the task queue is full.
pub async fn email_sync_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    if !user.gmail_connected {
        return Err(AppError::bad_request(
            "Gmail not connected",
            json!({ "hint": "connect Gmail via /api/auth/gmail first" }),
        ));
    }

    let task_id = state.task_queue.enqueue(Task::FetchEmails {
        user_id: user.id,
        since: None,
    })?;

    Ok((StatusCode::ACCEPTED, Json(TaskAccepted::started(task_id))))
}

/// Summarises an email synchronously.
///
/// # Endpoint
///
/// `POST /api/emails/{id}/generate_summary`
///
/// # Errors
///
/// Returns 400 when the email has no HTML body and 502 when the model fails.
pub async fn email_summary_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<EmailSummaryResponse>, AppError> {
    let ai_summary = state.collector_service.summarize_email(&user, id).await?;
    Ok(Json(EmailSummaryResponse { id, ai_summary }))
}

/// Lists links extracted from the caller's emails.
///
/// # Endpoint
///
/// `GET /api/links`
///
/// # Query Parameters
///
/// - `status`: `pending`, `valid`, `invalid`, `duplicate` or `error`
/// - `is_valid_article`
/// - `email`: restrict to one email
pub async fn link_list_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<LinkListQuery>,
) -> Result<Json<Paginated<LinkItem>>, AppError> {
    let (offset, limit) = params.pagination.offset_limit()?;

    let filter = LinkFilter {
        status: params.status,
        is_valid_article: params.is_valid_article,
        email_id: params.email,
    };

    let (links, count) = state
        .collector_service
        .list_links(&user, filter, offset, limit)
        .await?;

    Ok(Json(Paginated::new(
        links.into_iter().map(LinkItem::from).collect(),
        count,
        &params.pagination,
        &uri,
    )))
}

/// # Endpoint
///
/// `GET /api/links/{id}`
pub async fn link_detail_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<LinkItem>, AppError> {
    let link = state.collector_service.get_link(&user, id).await?;
    Ok(Json(link.into()))
}
