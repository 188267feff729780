//! Handlers for Google sign-in, Gmail consent and the current session.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde_json::json;

use crate::api::dto::users::{OAuthCallbackQuery, UserResponse};
use crate::api::middleware::auth::{
    OAUTH_STATE_COOKIE, clear_oauth_state_cookie, clear_session_cookie, cookie_value,
    oauth_state_cookie, session_cookie,
};
use crate::api::middleware::{CurrentUser, SessionToken};
use crate::application::services::auth_service::ConsentRedirect;
use crate::error::AppError;
use crate::state::AppState;

/// `code` and `state` of a consent-screen callback.
fn callback_params(query: OAuthCallbackQuery) -> Result<(String, String), AppError> {
    if let Some(error) = query.error {
        return Err(AppError::bad_request(
            "Google authorization was denied",
            json!({ "error": error }),
        ));
    }
    match (query.code, query.state) {
        (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => Ok((code, state)),
        _ => Err(AppError::bad_request(
            "Missing authorization code or state",
            json!({}),
        )),
    }
}

/// Redirects to Google's consent page and drops the state nonce into the
/// `oauth_state` cookie.
fn consent_redirect(redirect: ConsentRedirect, secure: bool) -> Response {
    (
        [(SET_COOKIE, oauth_state_cookie(&redirect.nonce, secure))],
        Redirect::to(&redirect.url),
    )
        .into_response()
}

/// Redirects to Google's consent page for sign-in.
///
/// # Endpoint
///
/// `GET /api/auth/google`
pub async fn google_login_handler(State(state): State<AppState>) -> Response {
    consent_redirect(state.auth_service.login_url(), state.web.cookie_secure)
}

/// Completes sign-in, sets the `session` cookie and sends the browser to the
/// dashboard.
///
/// # Endpoint
///
/// `GET /api/auth/google/callback?code=..&state=..`
///
/// # Errors
///
/// Returns 400 for a missing, tampered or expired `state`, or when the
/// `oauth_state` cookie is absent or holds another flow's nonce.
pub async fn google_callback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Response, AppError> {
    let (code, oauth_state) = callback_params(query)?;
    let nonce = cookie_value(&headers, OAUTH_STATE_COOKIE);
    let (_, token) = state
        .auth_service
        .complete_login(&code, &oauth_state, nonce.as_deref())
        .await?;

    let secure = state.web.cookie_secure;
    let redirect = Redirect::to(&format!("{}/dashboard", state.web.frontend_url));
    Ok((
        AppendHeaders([
            (SET_COOKIE, session_cookie(&token, secure)),
            (SET_COOKIE, clear_oauth_state_cookie(secure)),
        ]),
        redirect,
    )
        .into_response())
}

/// Redirects the signed-in user to the Gmail read-only consent page.
///
/// # Endpoint
///
/// `GET /api/auth/gmail`
pub async fn gmail_connect_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Response {
    consent_redirect(
        state.auth_service.gmail_connect_url(&user),
        state.web.cookie_secure,
    )
}

/// Stores the Gmail refresh token and returns to the settings page.
///
/// # Endpoint
///
/// `GET /api/auth/gmail/callback?code=..&state=..`
///
/// # Errors
///
/// Returns 400 for an invalid state, one issued to another user, or one
/// this browser did not start.
pub async fn gmail_callback_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Response, AppError> {
    let (code, oauth_state) = callback_params(query)?;
    let nonce = cookie_value(&headers, OAUTH_STATE_COOKIE);
    state
        .auth_service
        .complete_gmail_connect(&user, &code, &oauth_state, nonce.as_deref())
        .await?;

    let redirect = Redirect::to(&format!(
        "{}/settings?gmail=connected",
        state.web.frontend_url
    ));
    Ok((
        [(SET_COOKIE, clear_oauth_state_cookie(state.web.cookie_secure))],
        redirect,
    )
        .into_response())
}

/// Returns the authenticated user.
///
/// # Endpoint
///
/// `GET /api/auth/me`
pub async fn me_handler(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Revokes the current session and clears the cookie.
///
/// # Endpoint
///
/// `POST /api/auth/logout`
pub async fn logout_handler(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<Response, AppError> {
    state.auth_service.logout(&token).await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, clear_session_cookie(state.web.cookie_secure))],
    )
        .into_response())
}
