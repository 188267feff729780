mod common;

use chrono::{Duration, Utc};
use news_aggregator::domain::entities::{ClusterPatch, NewCluster};
use news_aggregator::domain::repositories::{ClusterFilter, ClusterRepository};
use news_aggregator::error::AppError;
use news_aggregator::infrastructure::persistence::PgClusterRepository;
use sqlx::PgPool;
use std::sync::Arc;

#[sqlx::test]
async fn test_create_seeds_one_member(pool: PgPool) {
    let article = common::create_article(&pool, "https://a.example.com/1", "One", Some(vec![1.0, 0.0, 0.0])).await;
    let repo = PgClusterRepository::new(Arc::new(pool));

    let cluster = repo
        .create(NewCluster {
            name: "Rust async".to_string(),
            slug: "rust-async".to_string(),
            primary_article_id: article,
            centroid_embedding: vec![1.0, 0.0, 0.0],
        })
        .await
        .unwrap();

    assert_eq!(cluster.article_count, 1);
    assert!(cluster.is_active);
    assert_eq!(cluster.primary_article_id, Some(article));
    assert_eq!(cluster.centroid_embedding, Some(vec![1.0, 0.0, 0.0]));
    assert!(cluster.last_article_added_at.is_some());
    assert!(repo.slug_exists("rust-async").await.unwrap());
    assert!(!repo.slug_exists("rust-sync").await.unwrap());
}

#[sqlx::test]
async fn test_list_search_and_count(pool: PgPool) {
    common::create_cluster(&pool, "Rust async", "rust-async").await;
    common::create_cluster(&pool, "Gardening", "gardening").await;
    let repo = PgClusterRepository::new(Arc::new(pool));

    let filter = ClusterFilter {
        search: Some("rust".to_string()),
        ..Default::default()
    };
    let clusters = repo.list(filter.clone(), 0, 10).await.unwrap();

    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].slug, "rust-async");
    assert_eq!(repo.count(filter).await.unwrap(), 1);
    assert_eq!(repo.count(ClusterFilter::default()).await.unwrap(), 2);
}

#[sqlx::test]
async fn test_statistics_keep_priority_when_absent(pool: PgPool) {
    let id = common::create_cluster(&pool, "Rust", "rust").await;
    let repo = PgClusterRepository::new(Arc::new(pool));

    repo.update_statistics(id, 4, Some(12.5)).await.unwrap();
    repo.update_statistics(id, 0, None).await.unwrap();

    let cluster = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(cluster.article_count, 0);
    assert_eq!(cluster.priority_score, 12.5);
}

#[sqlx::test]
async fn test_needing_summary(pool: PgPool) {
    let big = common::create_cluster(&pool, "Big", "big").await;
    let small = common::create_cluster(&pool, "Small", "small").await;
    let done = common::create_cluster(&pool, "Done", "done").await;
    let repo = PgClusterRepository::new(Arc::new(pool));

    repo.update_statistics(big, 5, Some(3.0)).await.unwrap();
    repo.update_statistics(small, 1, Some(9.0)).await.unwrap();
    repo.update_statistics(done, 5, Some(4.0)).await.unwrap();
    repo.set_summary(done, "Already summarised").await.unwrap();

    let clusters = repo.list_needing_summary(3, 10).await.unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].id, big);

    let summarised = repo.find_by_id(done).await.unwrap().unwrap();
    assert!(summarised.summary_generated_at.is_some());
}

#[sqlx::test]
async fn test_update_patch_and_missing(pool: PgPool) {
    let id = common::create_cluster(&pool, "Rust", "rust").await;
    let repo = PgClusterRepository::new(Arc::new(pool));

    let updated = repo
        .update(
            id,
            ClusterPatch {
                description: Some("Systems programming".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Rust");
    assert_eq!(updated.description, "Systems programming");

    let err = repo
        .update(999_999, ClusterPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[sqlx::test]
async fn test_merge_record_and_deactivate(pool: PgPool) {
    let source = common::create_cluster(&pool, "Async", "async").await;
    let target = common::create_cluster(&pool, "Rust", "rust").await;
    let repo = PgClusterRepository::new(Arc::new(pool));

    let merge = repo.record_merge(source, target, "overlap", 3).await.unwrap();
    repo.deactivate(source).await.unwrap();

    assert_eq!(merge.source_cluster_id, Some(source));
    assert_eq!(merge.target_cluster_id, target);
    assert_eq!(merge.articles_moved, 3);
    assert!(!repo.find_by_id(source).await.unwrap().unwrap().is_active);
    assert_eq!(repo.list_active().await.unwrap().len(), 1);
}

#[sqlx::test]
async fn test_deactivate_empty_respects_age(pool: PgPool) {
    let stale = common::create_cluster(&pool, "Stale", "stale").await;
    let fresh = common::create_cluster(&pool, "Fresh", "fresh").await;
    sqlx::query("UPDATE topic_clusters SET created_at = NOW() - INTERVAL '2 days' WHERE id = $1")
        .bind(stale)
        .execute(&pool)
        .await
        .unwrap();
    let repo = PgClusterRepository::new(Arc::new(pool));

    let deactivated = repo
        .deactivate_empty(Utc::now() - Duration::days(1))
        .await
        .unwrap();

    assert_eq!(deactivated, 1);
    assert!(!repo.find_by_id(stale).await.unwrap().unwrap().is_active);
    assert!(repo.find_by_id(fresh).await.unwrap().unwrap().is_active);
}

#[sqlx::test]
async fn test_delete(pool: PgPool) {
    let id = common::create_cluster(&pool, "Rust", "rust").await;
    let repo = PgClusterRepository::new(Arc::new(pool));

    assert!(repo.delete(id).await.unwrap());
    assert!(!repo.delete(id).await.unwrap());
}
