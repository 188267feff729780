mod common;

use axum::http::StatusCode;
use axum::{
    Router,
    routing::{get, post},
};
use axum_test::TestServer;
use news_aggregator::api::handlers::emails::{
    email_detail_handler, email_list_handler, email_summary_handler, email_sync_handler,
    link_detail_handler, link_list_handler,
};
use news_aggregator::domain::task::Task;
use news_aggregator::state::AppState;
use sqlx::PgPool;

fn app(state: AppState) -> Router {
    common::protected(
        Router::new()
            .route("/api/emails", get(email_list_handler))
            .route("/api/emails/sync", post(email_sync_handler))
            .route("/api/emails/{id}", get(email_detail_handler))
            .route(
                "/api/emails/{id}/generate_summary",
                post(email_summary_handler),
            )
            .route("/api/links", get(link_list_handler))
            .route("/api/links/{id}", get(link_detail_handler)),
        &state,
    )
    .with_state(state)
}

#[sqlx::test]
async fn test_list_only_returns_own_emails(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let bob = common::create_user(&pool, "bob@example.com", false).await;
    common::create_email(&pool, alice, "m1", "Rust weekly").await;
    common::create_email(&pool, alice, "m2", "Go weekly").await;
    common::create_email(&pool, bob, "m3", "Bob's digest").await;

    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server.get("/api/emails").authorization_bearer(&token).await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["count"], 2);
    assert_eq!(json["page"], 1);
    assert!(json["next"].is_null());
    assert!(
        json["results"]
            .as_array()
            .unwrap()
            .iter()
            .all(|e| e["subject"] != "Bob's digest")
    );
}

#[sqlx::test]
async fn test_list_search_and_pagination(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    for i in 0..3 {
        common::create_email(&pool, alice, &format!("r{i}"), &format!("Rust issue {i}")).await;
    }
    common::create_email(&pool, alice, "g1", "Gardening tips").await;

    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .get("/api/emails")
        .add_query_param("search", "rust")
        .add_query_param("page_size", "2")
        .authorization_bearer(&token)
        .await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["count"], 3);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    let next = json["next"].as_str().unwrap();
    assert!(next.contains("page=2"));
    assert!(next.contains("search=rust"));
}

#[sqlx::test]
async fn test_list_rejects_unknown_ordering(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .get("/api/emails")
        .add_query_param("ordering", "raw_html")
        .authorization_bearer(&token)
        .await;

    response.assert_status_bad_request();
}

#[sqlx::test]
async fn test_detail_includes_links_and_hides_other_users(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let bob = common::create_user(&pool, "bob@example.com", false).await;
    let email = common::create_email(&pool, alice, "m1", "Rust weekly").await;
    common::create_link(&pool, email, "https://blog.example.com/post", None).await;

    let (state, _rx) = common::create_test_state(pool);
    let alice_token = common::token_for(&state, alice).await;
    let bob_token = common::token_for(&state, bob).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .get(&format!("/api/emails/{email}"))
        .authorization_bearer(&alice_token)
        .await;
    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["raw_html"], "<p>Hello</p>");
    assert_eq!(json["extracted_links"].as_array().unwrap().len(), 1);

    server
        .get(&format!("/api/emails/{email}"))
        .authorization_bearer(&bob_token)
        .await
        .assert_status_not_found();
}

#[sqlx::test]
async fn test_sync_requires_gmail(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .post("/api/emails/sync")
        .authorization_bearer(&token)
        .await;

    response.assert_status_bad_request();
}

#[sqlx::test]
async fn test_sync_enqueues_fetch(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    common::connect_gmail(&pool, alice).await;
    let (state, mut rx) = common::create_test_state(pool);
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .post("/api/emails/sync")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "started");

    let envelope = rx.try_recv().unwrap();
    assert_eq!(json["task_id"], envelope.id.to_string());
    assert_eq!(
        envelope.task,
        Task::FetchEmails {
            user_id: alice,
            since: None
        }
    );
}

#[sqlx::test]
async fn test_generate_summary_is_synchronous(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let email = common::create_email(&pool, alice, "m1", "Rust weekly").await;
    let (state, _rx) = common::create_test_state(pool.clone());
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .post(&format!("/api/emails/{email}/generate_summary"))
        .authorization_bearer(&token)
        .await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["ai_summary"], "A short stub summary.");

    let stored: String = sqlx::query_scalar("SELECT ai_summary FROM newsletter_emails WHERE id = $1")
        .bind(email)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, "A short stub summary.");
}

#[sqlx::test]
async fn test_links_filter_by_email(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let first = common::create_email(&pool, alice, "m1", "One").await;
    let second = common::create_email(&pool, alice, "m2", "Two").await;
    let link = common::create_link(&pool, first, "https://a.example.com/x", None).await;
    common::create_link(&pool, second, "https://b.example.com/y", None).await;

    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .get("/api/links")
        .add_query_param("email", first)
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["id"], link);

    let response = server
        .get(&format!("/api/links/{link}"))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<serde_json::Value>()["canonical_url"],
        "https://a.example.com/x"
    );
}
