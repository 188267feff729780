//! API route configuration.
//!
//! Routes are split by authentication requirement; [`crate::routes`] attaches
//! [`crate::api::middleware::auth`] to the protected set only.

use crate::api::handlers::{articles, auth, clusters, emails, posts, users};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Routes readable without a session.
///
/// # Endpoints
///
/// - `GET /auth/google`, `GET /auth/google/callback` - Google sign-in
/// - `GET /articles`, `GET /articles/similar`, `GET /articles/{id}`
/// - `GET /clusters`, `GET /clusters/{id}`, `GET /clusters/{id}/articles`
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(auth::google_login_handler))
        .route("/auth/google/callback", get(auth::google_callback_handler))
        .route("/articles", get(articles::article_list_handler))
        .route("/articles/similar", get(articles::similar_articles_handler))
        .route("/articles/{id}", get(articles::article_detail_handler))
        .route("/clusters", get(clusters::cluster_list_handler))
        .route("/clusters/{id}", get(clusters::cluster_detail_handler))
        .route(
            "/clusters/{id}/articles",
            get(clusters::cluster_articles_handler),
        )
}

/// Routes requiring a Bearer token or session cookie.
///
/// # Endpoints
///
/// - `GET /auth/me`, `POST /auth/logout`
/// - `GET /auth/gmail`, `GET /auth/gmail/callback` - Gmail connect
/// - `GET /users`, `GET|PATCH /users/{id}`
/// - `GET /emails`, `GET /emails/{id}`, `POST /emails/sync`,
///   `POST /emails/{id}/generate_summary`
/// - `GET /links`, `GET /links/{id}`
/// - `POST /articles/{id}/rescrape`, `POST /articles/{id}/generate_summary`,
///   `POST /articles/process_pending`
/// - `PATCH|DELETE /clusters/{id}`, `POST /clusters/{id}/generate_summary`,
///   `POST /clusters/{id}/generate_post`, `POST /clusters/{id}/merge`
/// - `GET|POST /posts`, `GET|PATCH|DELETE /posts/{id}`, `POST /posts/generate`,
///   `POST /posts/{id}/publish`, `POST /posts/{id}/generate_image`
/// - `GET /jobs`, `GET /jobs/{id}`
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/gmail", get(auth::gmail_connect_handler))
        .route("/auth/gmail/callback", get(auth::gmail_callback_handler))
        .route("/users", get(users::user_list_handler))
        .route(
            "/users/{id}",
            get(users::user_detail_handler).patch(users::update_user_handler),
        )
        .route("/emails", get(emails::email_list_handler))
        .route("/emails/sync", post(emails::email_sync_handler))
        .route("/emails/{id}", get(emails::email_detail_handler))
        .route(
            "/emails/{id}/generate_summary",
            post(emails::email_summary_handler),
        )
        .route("/links", get(emails::link_list_handler))
        .route("/links/{id}", get(emails::link_detail_handler))
        .route(
            "/articles/process_pending",
            post(articles::process_pending_handler),
        )
        .route("/articles/{id}/rescrape", post(articles::rescrape_handler))
        .route(
            "/articles/{id}/generate_summary",
            post(articles::article_summary_handler),
        )
        .route(
            "/clusters/{id}",
            patch(clusters::update_cluster_handler)
                .delete(clusters::delete_cluster_handler),
        )
        .route(
            "/clusters/{id}/generate_summary",
            post(clusters::cluster_summary_handler),
        )
        .route(
            "/clusters/{id}/generate_post",
            post(clusters::cluster_post_handler),
        )
        .route("/clusters/{id}/merge", post(clusters::merge_cluster_handler))
        .route(
            "/posts",
            get(posts::post_list_handler).post(posts::create_post_handler),
        )
        .route("/posts/generate", post(posts::generate_post_handler))
        .route(
            "/posts/{id}",
            get(posts::post_detail_handler)
                .patch(posts::update_post_handler)
                .delete(posts::delete_post_handler),
        )
        .route("/posts/{id}/publish", post(posts::publish_post_handler))
        .route(
            "/posts/{id}/generate_image",
            post(posts::generate_image_handler),
        )
        .route("/jobs", get(posts::job_list_handler))
        .route("/jobs/{id}", get(posts::job_detail_handler))
}
