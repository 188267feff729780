mod common;

use axum::{Router, routing::get};
use axum_test::TestServer;
use news_aggregator::api::handlers::users::{
    update_user_handler, user_detail_handler, user_list_handler,
};
use news_aggregator::state::AppState;
use serde_json::json;
use sqlx::PgPool;

fn app(state: AppState) -> Router {
    let routes = Router::new()
        .route("/api/users", get(user_list_handler))
        .route(
            "/api/users/{id}",
            get(user_detail_handler).patch(update_user_handler),
        );

    common::protected(routes, &state).with_state(state)
}

#[sqlx::test]
async fn test_regular_user_sees_only_self(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let bob = common::create_user(&pool, "bob@example.com", false).await;
    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server.get("/api/users").authorization_bearer(&token).await;
    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["id"], alice);

    server
        .get(&format!("/api/users/{bob}"))
        .authorization_bearer(&token)
        .await
        .assert_status_not_found();
}

#[sqlx::test]
async fn test_admin_sees_everyone(pool: PgPool) {
    let admin = common::create_user(&pool, "admin@example.com", true).await;
    let bob = common::create_user(&pool, "bob@example.com", false).await;
    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, admin).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server.get("/api/users").authorization_bearer(&token).await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["count"], 2);

    let detail = server
        .get(&format!("/api/users/{bob}"))
        .authorization_bearer(&token)
        .await;
    detail.assert_status_ok();
    let json = detail.json::<serde_json::Value>();
    assert_eq!(json["email"], "bob@example.com");
    assert!(json.get("gmail_token").is_none());
}

#[sqlx::test]
async fn test_update_own_profile(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, alice).await;
    let server = TestServer::new(app(state)).unwrap();

    let response = server
        .patch(&format!("/api/users/{alice}"))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Alice Liddell", "avatar_url": "https://img.example.com/a.png" }))
        .await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["name"], "Alice Liddell");
    assert_eq!(json["avatar_url"], "https://img.example.com/a.png");

    server
        .patch(&format!("/api/users/{alice}"))
        .authorization_bearer(&token)
        .json(&json!({ "avatar_url": "not a url" }))
        .await
        .assert_status_bad_request();
}

#[sqlx::test]
async fn test_cannot_update_someone_else(pool: PgPool) {
    let admin = common::create_user(&pool, "admin@example.com", true).await;
    let bob = common::create_user(&pool, "bob@example.com", false).await;
    let (state, _rx) = common::create_test_state(pool);
    let token = common::token_for(&state, admin).await;
    let server = TestServer::new(app(state)).unwrap();

    server
        .patch(&format!("/api/users/{bob}"))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Robert" }))
        .await
        .assert_status(axum::http::StatusCode::FORBIDDEN);
}
