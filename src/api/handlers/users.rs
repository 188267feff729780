//! Handlers for the users API.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
};
use validator::Validate;

use crate::api::dto::pagination::{Paginated, PaginationParams};
use crate::api::dto::users::{UpdateUserRequest, UserResponse};
use crate::api::middleware::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Lists users: everyone for admins, only the caller otherwise.
///
/// # Endpoint
///
/// `GET /api/users`
pub async fn user_list_handler(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<UserResponse>>, AppError> {
    let (offset, limit) = params.offset_limit()?;
    let (users, count) = state.user_service.list(&viewer, offset, limit).await?;

    Ok(Json(Paginated::new(
        users.into_iter().map(UserResponse::from).collect(),
        count,
        &params,
        &uri,
    )))
}

/// # Endpoint
///
/// `GET /api/users/{id}`
///
/// # Errors
///
/// Returns 404 for users outside the caller's scope.
pub async fn user_detail_handler(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.user_service.get(&viewer, id).await?;
    Ok(Json(user.into()))
}

/// Updates the caller's own name and avatar.
///
/// # Endpoint
///
/// `PATCH /api/users/{id}`
///
/// # Errors
///
/// Returns 400 for invalid fields and 403 when editing someone else.
pub async fn update_user_handler(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let user = state
        .user_service
        .update_profile(&viewer, id, payload.name, payload.avatar_url)
        .await?;
    Ok(Json(user.into()))
}
