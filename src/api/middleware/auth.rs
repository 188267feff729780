//! Session authentication middleware.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;
use serde_json::json;

use crate::domain::entities::User;
use crate::{error::AppError, state::AppState};

/// Name of the dashboard session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Lifetime of the session cookie, matching web sessions.
const SESSION_COOKIE_MAX_AGE: i64 = 30 * 24 * 60 * 60;

/// Holds the nonce of an OAuth flow between the redirect and the callback.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Matches the lifetime of a signed OAuth state.
const OAUTH_STATE_COOKIE_MAX_AGE: i64 = 10 * 60;
const OAUTH_STATE_COOKIE_PATH: &str = "/api/auth";

/// The authenticated user, inserted by [`layer`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The raw token the request authenticated with (used by logout).
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(not_authenticated)
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionToken>()
            .cloned()
            .ok_or_else(not_authenticated)
    }
}

fn not_authenticated() -> AppError {
    AppError::unauthorized(
        "Unauthorized",
        json!({ "reason": "Authentication credentials were not provided" }),
    )
}

/// Authenticates requests with a bearer token or the session cookie.
///
/// # Accepted credentials
///
/// ```text
/// Authorization: Bearer <token>     (CLI-issued tokens)
/// Cookie: session=<token>           (browser sign-in)
/// ```
///
/// The `Authorization` header wins when both are present.
///
/// # Errors
///
/// Returns `401 Unauthorized` if no credentials are sent, or the token is
/// unknown, revoked or expired.
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let token = match AuthBearer::from_request_parts(&mut parts, &()).await {
        Ok(AuthBearer(token)) => token,
        Err(_) => cookie_value(&parts.headers, SESSION_COOKIE).ok_or_else(not_authenticated)?,
    };

    let user = st.auth_service.authenticate(&token).await?;
    parts.extensions.insert(CurrentUser(user));
    parts.extensions.insert(SessionToken(token));

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Value of one cookie from the `Cookie` header(s).
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

/// `Set-Cookie` value carrying a new session token.
pub fn session_cookie(token: &str, secure: bool) -> String {
    build_cookie(SESSION_COOKIE, token, "/", SESSION_COOKIE_MAX_AGE, secure)
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    build_cookie(SESSION_COOKIE, "", "/", 0, secure)
}

/// `Set-Cookie` value binding an OAuth flow to this browser.
pub fn oauth_state_cookie(nonce: &str, secure: bool) -> String {
    build_cookie(
        OAUTH_STATE_COOKIE,
        nonce,
        OAUTH_STATE_COOKIE_PATH,
        OAUTH_STATE_COOKIE_MAX_AGE,
        secure,
    )
}

/// `Set-Cookie` value that removes the OAuth state cookie.
pub fn clear_oauth_state_cookie(secure: bool) -> String {
    build_cookie(OAUTH_STATE_COOKIE, "", OAUTH_STATE_COOKIE_PATH, 0, secure)
}

fn build_cookie(name: &str, value: &str, path: &str, max_age: i64, secure: bool) -> String {
    let mut cookie =
        format!("{name}={value}; Path={path}; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
