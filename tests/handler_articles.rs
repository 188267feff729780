mod common;

use axum::http::StatusCode;
use axum::{
    Router,
    routing::{get, post},
};
use axum_test::TestServer;
use news_aggregator::api::handlers::articles::{
    article_detail_handler, article_list_handler, article_summary_handler,
    process_pending_handler, rescrape_handler, similar_articles_handler,
};
use news_aggregator::domain::task::Task;
use news_aggregator::state::AppState;
use sqlx::PgPool;

fn app(state: AppState) -> Router {
    let protected = common::protected(
        Router::new()
            .route(
                "/api/articles/process_pending",
                post(process_pending_handler),
            )
            .route("/api/articles/{id}/rescrape", post(rescrape_handler))
            .route(
                "/api/articles/{id}/generate_summary",
                post(article_summary_handler),
            ),
        &state,
    );

    Router::new()
        .route("/api/articles", get(article_list_handler))
        .route("/api/articles/similar", get(similar_articles_handler))
        .route("/api/articles/{id}", get(article_detail_handler))
        .merge(protected)
        .with_state(state)
}

#[sqlx::test]
async fn test_list_is_public_and_filters(pool: PgPool) {
    common::create_article(&pool, "https://a.example.com/1", "Rust async", Some(vec![1.0, 0.0, 0.0])).await;
    common::create_article(&pool, "https://a.example.com/2", "Rust traits", None).await;
    common::create_article(&pool, "https://b.example.com/3", "Gardening", None).await;

    let (state, _rx) = common::create_test_state(pool);
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .get("/api/articles")
        .add_query_param("title", "rust")
        .add_query_param("scrape_status", "pending")
        .await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["title"], "Rust traits");
    assert_eq!(json["results"][0]["has_embedding"], false);
    assert!(json["results"][0].get("embedding").is_none());
}

#[sqlx::test]
async fn test_list_rejects_bad_page(pool: PgPool) {
    let (state, _rx) = common::create_test_state(pool);
    let server = TestServer::new(app(state)).unwrap();

    server
        .get("/api/articles")
        .add_query_param("page", "0")
        .await
        .assert_status_bad_request();

    server
        .get("/api/articles")
        .add_query_param("page_size", "500")
        .await
        .assert_status_bad_request();
}

#[sqlx::test]
async fn test_detail_includes_source_links(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    let email = common::create_email(&pool, user, "m1", "Weekly").await;
    let article = common::create_article(&pool, "https://a.example.com/1", "Rust async", None).await;
    common::create_link(&pool, email, "https://a.example.com/1", Some(article)).await;

    let (state, _rx) = common::create_test_state(pool);
    let server = TestServer::new(app(state)).unwrap();

    let response = server.get(&format!("/api/articles/{article}")).await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["id"], article);
    assert_eq!(json["source_links"].as_array().unwrap().len(), 1);

    server.get("/api/articles/999999").await.assert_status_not_found();
}

#[sqlx::test]
async fn test_similar_ranks_above_threshold(pool: PgPool) {
    let source = common::create_article(&pool, "https://a.example.com/1", "Source", Some(vec![1.0, 0.0, 0.0])).await;
    let twin = common::create_article(&pool, "https://a.example.com/2", "Twin", Some(vec![0.99, 0.1, 0.0])).await;
    common::create_article(&pool, "https://a.example.com/3", "Other", Some(vec![0.0, 1.0, 0.0])).await;

    let (state, _rx) = common::create_test_state(pool);
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .get("/api/articles/similar")
        .add_query_param("article_id", source)
        .await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    let results = json.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], twin);
}

#[sqlx::test]
async fn test_similar_requires_embedding(pool: PgPool) {
    let bare = common::create_article(&pool, "https://a.example.com/1", "Bare", None).await;
    let (state, _rx) = common::create_test_state(pool);
    let server = TestServer::new(app(state)).unwrap();

    server
        .get("/api/articles/similar")
        .await
        .assert_status_bad_request();

    server
        .get("/api/articles/similar")
        .add_query_param("article_id", bare)
        .await
        .assert_status_bad_request();
}

#[sqlx::test]
async fn test_rescrape_requires_auth_and_enqueues(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    let article = common::create_article(&pool, "https://a.example.com/1", "Rust", None).await;
    let (state, mut rx) = common::create_test_state(pool);
    let token = common::token_for(&state, user).await;
    let server = TestServer::new(app(state)).unwrap();

    server
        .post(&format!("/api/articles/{article}/rescrape"))
        .await
        .assert_status_unauthorized();

    let response = server
        .post(&format!("/api/articles/{article}/rescrape"))
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(
        rx.try_recv().unwrap().task,
        Task::ScrapeArticle {
            article_id: article
        }
    );
}

#[sqlx::test]
async fn test_process_pending_without_work(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    common::create_article(&pool, "https://a.example.com/1", "Done", Some(vec![1.0, 0.0, 0.0])).await;
    let (state, mut rx) = common::create_test_state(pool);
    let token = common::token_for(&state, user).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .post("/api/articles/process_pending")
        .authorization_bearer(&token)
        .await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "no_pending");
    assert!(rx.try_recv().is_err());
}

#[sqlx::test]
async fn test_process_pending_queues_batch(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    common::create_article(&pool, "https://a.example.com/1", "One", None).await;
    common::create_article(&pool, "https://a.example.com/2", "Two", None).await;
    let (state, mut rx) = common::create_test_state(pool);
    let token = common::token_for(&state, user).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .post("/api/articles/process_pending")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "started");
    assert_eq!(json["pending_count"], 2);
    assert_eq!(json["queued"], 2);

    let first = rx.try_recv().unwrap();
    assert_eq!(json["task_id"], first.id.to_string());
    assert!(matches!(first.task, Task::ScrapeArticle { .. }));
    assert!(rx.try_recv().is_ok());
}
