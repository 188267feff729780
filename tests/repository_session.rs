mod common;

use chrono::{Duration, Utc};
use news_aggregator::domain::repositories::SessionRepository;
use news_aggregator::error::AppError;
use news_aggregator::infrastructure::persistence::PgSessionRepository;
use sqlx::PgPool;
use std::sync::Arc;

#[sqlx::test]
async fn test_create_session(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    let repo = PgSessionRepository::new(Arc::new(pool));

    let session = repo.create(user, "web", "hash123", None).await.unwrap();

    assert_eq!(session.user_id, user);
    assert_eq!(session.name, "web");
    assert_eq!(session.token_hash, "hash123");
    assert!(session.revoked_at.is_none());
}

#[sqlx::test]
async fn test_duplicate_hash_is_conflict(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    let repo = PgSessionRepository::new(Arc::new(pool));

    repo.create(user, "web", "samehash", None).await.unwrap();
    let err = repo.create(user, "cli", "samehash", None).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict { .. }));
}

#[sqlx::test]
async fn test_find_active_skips_revoked_and_expired(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    let repo = PgSessionRepository::new(Arc::new(pool));

    repo.create(user, "live", "live", Some(Utc::now() + Duration::hours(1)))
        .await
        .unwrap();
    repo.create(user, "old", "old", Some(Utc::now() - Duration::minutes(1)))
        .await
        .unwrap();
    let revoked = repo.create(user, "gone", "gone", None).await.unwrap();
    repo.revoke(revoked.id).await.unwrap();

    assert!(repo.find_active("live").await.unwrap().is_some());
    assert!(repo.find_active("old").await.unwrap().is_none());
    assert!(repo.find_active("gone").await.unwrap().is_none());
    assert!(repo.find_active("missing").await.unwrap().is_none());
}

#[sqlx::test]
async fn test_revoke_by_hash_reports_change(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    let repo = PgSessionRepository::new(Arc::new(pool));

    repo.create(user, "web", "revokeme", None).await.unwrap();

    assert!(repo.revoke_by_hash("revokeme").await.unwrap());
    assert!(!repo.revoke_by_hash("revokeme").await.unwrap());
}

#[sqlx::test]
async fn test_update_last_used(pool: PgPool) {
    let user = common::create_user(&pool, "alice@example.com", false).await;
    let repo = PgSessionRepository::new(Arc::new(pool.clone()));

    let session = repo.create(user, "web", "usedhash", None).await.unwrap();
    repo.update_last_used("usedhash").await.unwrap();

    let last_used: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar("SELECT last_used_at FROM sessions WHERE id = $1")
            .bind(session.id)
            .fetch_one(&pool)
            .await
            .unwrap();

    assert!(last_used.is_some());
}

#[sqlx::test]
async fn test_list_and_lookup(pool: PgPool) {
    let alice = common::create_user(&pool, "alice@example.com", false).await;
    let bob = common::create_user(&pool, "bob@example.com", false).await;
    let repo = PgSessionRepository::new(Arc::new(pool));

    let first = repo.create(alice, "laptop", "h1", None).await.unwrap();
    repo.create(alice, "phone", "h2", None).await.unwrap();
    repo.create(bob, "ci", "h3", None).await.unwrap();

    assert_eq!(repo.list(None).await.unwrap().len(), 3);
    assert_eq!(repo.list(Some(alice)).await.unwrap().len(), 2);

    let by_id = repo.find_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(by_id.name, "laptop");

    let by_name = repo.find_by_name("ci").await.unwrap().unwrap();
    assert_eq!(by_name.user_id, bob);
    assert!(repo.find_by_name("nope").await.unwrap().is_none());
}
