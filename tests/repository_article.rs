mod common;

use news_aggregator::domain::entities::{NewArticle, ScrapeStatus, ScrapedContent};
use news_aggregator::domain::repositories::{ArticleFilter, ArticleRepository};
use news_aggregator::error::AppError;
use news_aggregator::infrastructure::persistence::PgArticleRepository;
use sqlx::PgPool;
use std::sync::Arc;

fn new_article(url: &str, hash: &str) -> NewArticle {
    NewArticle {
        canonical_url: url.to_string(),
        url_hash: hash.to_string(),
    }
}

#[sqlx::test]
async fn test_create_starts_pending(pool: PgPool) {
    let repo = PgArticleRepository::new(Arc::new(pool));

    let article = repo
        .create(new_article("https://a.example.com/1", "hash-1"))
        .await
        .unwrap();

    assert_eq!(article.scrape_status, ScrapeStatus::Pending);
    assert_eq!(article.scrape_attempts, 0);
    assert!(article.embedding.is_none());

    let found = repo.find_by_hash("hash-1").await.unwrap();
    assert_eq!(found.map(|a| a.id), Some(article.id));
}

#[sqlx::test]
async fn test_duplicate_url_is_conflict(pool: PgPool) {
    let repo = PgArticleRepository::new(Arc::new(pool));

    repo.create(new_article("https://a.example.com/1", "hash-1"))
        .await
        .unwrap();
    let err = repo
        .create(new_article("https://a.example.com/1", "hash-2"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict { .. }));
}

#[sqlx::test]
async fn test_scrape_lifecycle(pool: PgPool) {
    let repo = PgArticleRepository::new(Arc::new(pool));
    let article = repo
        .create(new_article("https://a.example.com/1", "hash-1"))
        .await
        .unwrap();

    let started = repo.mark_scrape_started(article.id).await.unwrap();
    assert_eq!(started.scrape_status, ScrapeStatus::InProgress);
    assert_eq!(started.scrape_attempts, 1);
    assert!(started.last_scrape_at.is_some());

    repo.mark_scrape_failed(article.id, "timeout").await.unwrap();
    let failed = repo.find_by_id(article.id).await.unwrap().unwrap();
    assert_eq!(failed.scrape_status, ScrapeStatus::Failed);
    assert_eq!(failed.scrape_error, "timeout");

    repo.mark_scrape_started(article.id).await.unwrap();
    repo.save_scraped(
        article.id,
        ScrapedContent {
            title: "Async Rust".to_string(),
            content_text: "Body".to_string(),
            word_count: 1,
            language: "en".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let scraped = repo.find_by_id(article.id).await.unwrap().unwrap();
    assert_eq!(scraped.scrape_status, ScrapeStatus::Success);
    assert_eq!(scraped.scrape_attempts, 2);
    assert_eq!(scraped.title, "Async Rust");
    assert!(scraped.scrape_error.is_empty());
}

#[sqlx::test]
async fn test_pending_respects_attempt_limit(pool: PgPool) {
    let fresh = common::create_article(&pool, "https://a.example.com/1", "Fresh", None).await;
    let tired = common::create_article(&pool, "https://a.example.com/2", "Tired", None).await;
    sqlx::query("UPDATE articles SET scrape_attempts = 3 WHERE id = $1")
        .bind(tired)
        .execute(&pool)
        .await
        .unwrap();
    let repo = PgArticleRepository::new(Arc::new(pool));

    let pending = repo.list_pending(3, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, fresh);
    assert_eq!(repo.count_pending(3).await.unwrap(), 1);
}

#[sqlx::test]
async fn test_embeddings_and_missing(pool: PgPool) {
    let a = common::create_article(&pool, "https://a.example.com/1", "A", Some(vec![1.0, 0.0, 0.0])).await;
    let b = common::create_article(&pool, "https://a.example.com/2", "B", Some(vec![0.0, 1.0, 0.0])).await;
    let c = common::create_article(&pool, "https://a.example.com/3", "C", None).await;
    sqlx::query("UPDATE articles SET scrape_status = 'success' WHERE id = $1")
        .bind(c)
        .execute(&pool)
        .await
        .unwrap();
    let repo = PgArticleRepository::new(Arc::new(pool));

    let others = repo.list_embeddings(a).await.unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].id, b);

    let missing = repo.list_missing_embeddings(10).await.unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, c);

    repo.set_embedding(c, vec![0.0, 0.0, 1.0], "text-embedding-004")
        .await
        .unwrap();
    assert!(repo.list_missing_embeddings(10).await.unwrap().is_empty());
    let embedded = repo.find_by_id(c).await.unwrap().unwrap();
    assert_eq!(embedded.embedding_model, "text-embedding-004");
}

#[sqlx::test]
async fn test_list_filters(pool: PgPool) {
    let cluster = common::create_cluster(&pool, "Rust", "rust").await;
    let a = common::create_article(&pool, "https://a.example.com/rust", "Rust async", None).await;
    common::create_article(&pool, "https://b.example.com/garden", "Gardening", None).await;
    common::add_to_cluster(&pool, cluster, &[a]).await;
    let repo = PgArticleRepository::new(Arc::new(pool));

    let clustered = ArticleFilter {
        has_cluster: Some(true),
        ..Default::default()
    };
    let rows = repo.list(clustered.clone(), 0, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, a);
    assert_eq!(repo.count(clustered).await.unwrap(), 1);

    let search = ArticleFilter {
        search: Some("GARDEN".to_string()),
        ..Default::default()
    };
    assert_eq!(repo.count(search).await.unwrap(), 1);
}

#[sqlx::test]
async fn test_move_cluster_counts_rows(pool: PgPool) {
    let from = common::create_cluster(&pool, "From", "from").await;
    let to = common::create_cluster(&pool, "To", "to").await;
    let a = common::create_article(&pool, "https://a.example.com/1", "A", None).await;
    let b = common::create_article(&pool, "https://a.example.com/2", "B", None).await;
    common::add_to_cluster(&pool, from, &[a, b]).await;
    let repo = PgArticleRepository::new(Arc::new(pool));

    assert_eq!(repo.move_cluster(from, to).await.unwrap(), 2);
    assert_eq!(repo.count_in_cluster(to).await.unwrap(), 2);
    assert_eq!(repo.count_in_cluster(from).await.unwrap(), 0);
}

#[sqlx::test]
async fn test_record_duplicate_is_idempotent(pool: PgPool) {
    let a = common::create_article(&pool, "https://a.example.com/1", "A", None).await;
    let b = common::create_article(&pool, "https://a.example.com/2", "B", None).await;
    let repo = PgArticleRepository::new(Arc::new(pool.clone()));

    repo.record_duplicate(a, b, 0.97).await.unwrap();
    repo.record_duplicate(a, b, 0.97).await.unwrap();

    let pairs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article_duplicates")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(pairs, 1);
}
