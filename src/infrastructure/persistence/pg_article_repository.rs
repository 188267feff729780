//! PostgreSQL implementation of article repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use super::like_pattern;
use crate::domain::entities::{
    Article, ArticleEmbedding, NewArticle, ScrapeStatus, ScrapedContent,
};
use crate::domain::repositories::{ArticleFilter, ArticleRepository};
use crate::error::AppError;

const ARTICLE_COLUMNS: &str = "id, canonical_url, url_hash, title, author, publication, \
     publication_date, content_text, content_html, excerpt, word_count, embedding, \
     embedding_model, summary, topic_cluster_id, similarity_to_cluster, scrape_status, \
     scrape_error, scrape_attempts, last_scrape_at, og_image, language, created_at, updated_at";

/// PostgreSQL repository for articles, their scrape state and embeddings.
pub struct PgArticleRepository {
    pool: Arc<PgPool>,
}

impl PgArticleRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn filtered(select: &str, filter: &ArticleFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM articles WHERE TRUE");

    if let Some(status) = filter.scrape_status {
        qb.push(" AND scrape_status = ").push_bind(status);
    }
    if let Some(cluster_id) = filter.topic_cluster_id {
        qb.push(" AND topic_cluster_id = ").push_bind(cluster_id);
    }
    if let Some(publication) = &filter.publication {
        qb.push(" AND publication ILIKE ")
            .push_bind(like_pattern(publication));
    }
    if let Some(title) = &filter.title {
        qb.push(" AND title ILIKE ").push_bind(like_pattern(title));
    }
    match filter.has_cluster {
        Some(true) => {
            qb.push(" AND topic_cluster_id IS NOT NULL");
        }
        Some(false) => {
            qb.push(" AND topic_cluster_id IS NULL");
        }
        None => {}
    }
    if let Some(after) = filter.published_after {
        qb.push(" AND publication_date >= ").push_bind(after);
    }
    if let Some(before) = filter.published_before {
        qb.push(" AND publication_date <= ").push_bind(before);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR excerpt ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR content_text ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR canonical_url ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    qb
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Article>, AppError> {
        let article = sqlx::query_as!(
            Article,
            r#"
            SELECT id, canonical_url, url_hash, title, author, publication, publication_date,
                   content_text, content_html, excerpt, word_count, embedding, embedding_model,
                   summary, topic_cluster_id, similarity_to_cluster,
                   scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                   last_scrape_at, og_image, language, created_at, updated_at
            FROM articles
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(article)
    }

    async fn find_by_hash(&self, url_hash: &str) -> Result<Option<Article>, AppError> {
        let article = sqlx::query_as!(
            Article,
            r#"
            SELECT id, canonical_url, url_hash, title, author, publication, publication_date,
                   content_text, content_html, excerpt, word_count, embedding, embedding_model,
                   summary, topic_cluster_id, similarity_to_cluster,
                   scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                   last_scrape_at, og_image, language, created_at, updated_at
            FROM articles
            WHERE url_hash = $1
            "#,
            url_hash
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(article)
    }

    async fn find_many(&self, ids: Vec<i64>) -> Result<Vec<Article>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut articles = sqlx::query_as!(
            Article,
            r#"
            SELECT id, canonical_url, url_hash, title, author, publication, publication_date,
                   content_text, content_html, excerpt, word_count, embedding, embedding_model,
                   summary, topic_cluster_id, similarity_to_cluster,
                   scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                   last_scrape_at, og_image, language, created_at, updated_at
            FROM articles
            WHERE id = ANY($1)
            "#,
            &ids[..]
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        // Preserve the caller's ranking.
        articles.sort_by_key(|a| ids.iter().position(|id| *id == a.id));
        Ok(articles)
    }

    async fn create(&self, new_article: NewArticle) -> Result<Article, AppError> {
        let article = sqlx::query_as!(
            Article,
            r#"
            INSERT INTO articles (canonical_url, url_hash)
            VALUES ($1, $2)
            RETURNING id, canonical_url, url_hash, title, author, publication, publication_date,
                      content_text, content_html, excerpt, word_count, embedding, embedding_model,
                      summary, topic_cluster_id, similarity_to_cluster,
                      scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                      last_scrape_at, og_image, language, created_at, updated_at
            "#,
            new_article.canonical_url,
            new_article.url_hash
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(article)
    }

    async fn list(
        &self,
        filter: ArticleFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, AppError> {
        let mut qb = filtered(&format!("SELECT {ARTICLE_COLUMNS}"), &filter);

        let order = filter
            .ordering
            .map(|o| o.to_sql())
            .unwrap_or_else(|| "created_at DESC".to_string());
        qb.push(" ORDER BY ")
            .push(order)
            .push(", id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let articles = qb
            .build_query_as::<Article>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(articles)
    }

    async fn count(&self, filter: ArticleFilter) -> Result<i64, AppError> {
        let count = filtered("SELECT COUNT(*)", &filter)
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn mark_scrape_started(&self, id: i64) -> Result<Article, AppError> {
        sqlx::query_as!(
            Article,
            r#"
            UPDATE articles
            SET scrape_status = 'in_progress',
                scrape_attempts = scrape_attempts + 1,
                last_scrape_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, canonical_url, url_hash, title, author, publication, publication_date,
                      content_text, content_html, excerpt, word_count, embedding, embedding_model,
                      summary, topic_cluster_id, similarity_to_cluster,
                      scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                      last_scrape_at, og_image, language, created_at, updated_at
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Article not found", json!({ "id": id })))
    }

    async fn save_scraped(&self, id: i64, content: ScrapedContent) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE articles
            SET title = $2,
                author = $3,
                publication = $4,
                publication_date = $5,
                content_text = $6,
                content_html = $7,
                excerpt = $8,
                word_count = $9,
                og_image = $10,
                language = $11,
                scrape_status = 'success',
                scrape_error = '',
                updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            content.title,
            content.author,
            content.publication,
            content.publication_date,
            content.content_text,
            content.content_html,
            content.excerpt,
            content.word_count,
            content.og_image,
            content.language
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn mark_scrape_failed(&self, id: i64, error: &str) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE articles
            SET scrape_status = 'failed', scrape_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            error
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn set_embedding(
        &self,
        id: i64,
        embedding: Vec<f32>,
        model: &str,
    ) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE articles SET embedding = $2, embedding_model = $3, updated_at = NOW() WHERE id = $1",
            id,
            &embedding[..],
            model
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn set_summary(&self, id: i64, summary: &str) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE articles SET summary = $2, updated_at = NOW() WHERE id = $1",
            id,
            summary
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn assign_cluster(
        &self,
        id: i64,
        cluster_id: Option<i64>,
        similarity: Option<f64>,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE articles
            SET topic_cluster_id = $2, similarity_to_cluster = $3, updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            cluster_id,
            similarity
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_pending(&self, max_attempts: i32, limit: i64) -> Result<Vec<Article>, AppError> {
        let articles = sqlx::query_as!(
            Article,
            r#"
            SELECT id, canonical_url, url_hash, title, author, publication, publication_date,
                   content_text, content_html, excerpt, word_count, embedding, embedding_model,
                   summary, topic_cluster_id, similarity_to_cluster,
                   scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                   last_scrape_at, og_image, language, created_at, updated_at
            FROM articles
            WHERE scrape_status = 'pending' AND scrape_attempts < $1
            ORDER BY created_at, id
            LIMIT $2
            "#,
            max_attempts,
            limit
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(articles)
    }

    async fn count_pending(&self, max_attempts: i32) -> Result<i64, AppError> {
        let count = sqlx::query_scalar!(
            r#"
            SELECT COUNT(*) AS "count!"
            FROM articles
            WHERE scrape_status = 'pending' AND scrape_attempts < $1
            "#,
            max_attempts
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn list_retryable(
        &self,
        max_attempts: i32,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Article>, AppError> {
        let articles = sqlx::query_as!(
            Article,
            r#"
            SELECT id, canonical_url, url_hash, title, author, publication, publication_date,
                   content_text, content_html, excerpt, word_count, embedding, embedding_model,
                   summary, topic_cluster_id, similarity_to_cluster,
                   scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                   last_scrape_at, og_image, language, created_at, updated_at
            FROM articles
            WHERE scrape_status = 'failed'
              AND scrape_attempts < $1
              AND (last_scrape_at IS NULL OR last_scrape_at < $2)
            ORDER BY last_scrape_at NULLS FIRST, id
            LIMIT $3
            "#,
            max_attempts,
            before,
            limit
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(articles)
    }

    async fn list_missing_embeddings(&self, limit: i64) -> Result<Vec<Article>, AppError> {
        let articles = sqlx::query_as!(
            Article,
            r#"
            SELECT id, canonical_url, url_hash, title, author, publication, publication_date,
                   content_text, content_html, excerpt, word_count, embedding, embedding_model,
                   summary, topic_cluster_id, similarity_to_cluster,
                   scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                   last_scrape_at, og_image, language, created_at, updated_at
            FROM articles
            WHERE scrape_status = 'success' AND embedding IS NULL
            ORDER BY created_at, id
            LIMIT $1
            "#,
            limit
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(articles)
    }

    async fn list_embeddings(&self, exclude_id: i64) -> Result<Vec<ArticleEmbedding>, AppError> {
        let rows = sqlx::query_as!(
            ArticleEmbedding,
            r#"
            SELECT id, topic_cluster_id, created_at, embedding AS "embedding!"
            FROM articles
            WHERE embedding IS NOT NULL AND id <> $1
            "#,
            exclude_id
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn cluster_embeddings(
        &self,
        cluster_id: i64,
        limit: i64,
    ) -> Result<Vec<ArticleEmbedding>, AppError> {
        let rows = sqlx::query_as!(
            ArticleEmbedding,
            r#"
            SELECT id, topic_cluster_id, created_at, embedding AS "embedding!"
            FROM articles
            WHERE topic_cluster_id = $1 AND embedding IS NOT NULL
            ORDER BY created_at, id
            LIMIT $2
            "#,
            cluster_id,
            limit
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn list_in_cluster(
        &self,
        cluster_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>, AppError> {
        let articles = sqlx::query_as!(
            Article,
            r#"
            SELECT id, canonical_url, url_hash, title, author, publication, publication_date,
                   content_text, content_html, excerpt, word_count, embedding, embedding_model,
                   summary, topic_cluster_id, similarity_to_cluster,
                   scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                   last_scrape_at, og_image, language, created_at, updated_at
            FROM articles
            WHERE topic_cluster_id = $1
            ORDER BY similarity_to_cluster DESC NULLS LAST, id
            LIMIT $2 OFFSET $3
            "#,
            cluster_id,
            limit,
            offset
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(articles)
    }

    async fn count_in_cluster(&self, cluster_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar!(
            r#"SELECT COUNT(*) AS "count!" FROM articles WHERE topic_cluster_id = $1"#,
            cluster_id
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn count_recent_in_cluster(
        &self,
        cluster_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar!(
            r#"
            SELECT COUNT(*) AS "count!"
            FROM articles
            WHERE topic_cluster_id = $1
              AND COALESCE(publication_date, created_at) >= $2
            "#,
            cluster_id,
            since
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn list_scraped_in_cluster(
        &self,
        cluster_id: i64,
        limit: i64,
    ) -> Result<Vec<Article>, AppError> {
        let articles = sqlx::query_as!(
            Article,
            r#"
            SELECT id, canonical_url, url_hash, title, author, publication, publication_date,
                   content_text, content_html, excerpt, word_count, embedding, embedding_model,
                   summary, topic_cluster_id, similarity_to_cluster,
                   scrape_status AS "scrape_status: ScrapeStatus", scrape_error, scrape_attempts,
                   last_scrape_at, og_image, language, created_at, updated_at
            FROM articles
            WHERE topic_cluster_id = $1 AND scrape_status = 'success'
            ORDER BY publication_date DESC NULLS LAST, created_at DESC
            LIMIT $2
            "#,
            cluster_id,
            limit
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(articles)
    }

    async fn move_cluster(&self, from: i64, to: i64) -> Result<i64, AppError> {
        let result = sqlx::query!(
            "UPDATE articles SET topic_cluster_id = $2, updated_at = NOW() WHERE topic_cluster_id = $1",
            from,
            to
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() as i64)
    }

    async fn record_duplicate(
        &self,
        primary_id: i64,
        duplicate_id: i64,
        similarity: f64,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            INSERT INTO article_duplicates (primary_article_id, duplicate_article_id, similarity_score)
            VALUES ($1, $2, $3)
            ON CONFLICT (primary_article_id, duplicate_article_id) DO NOTHING
            "#,
            primary_id,
            duplicate_id,
            similarity
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn count_by_status(&self) -> Result<Vec<(ScrapeStatus, i64)>, AppError> {
        let rows = sqlx::query!(
            r#"
            SELECT scrape_status AS "scrape_status!: ScrapeStatus", COUNT(*) AS "count!"
            FROM articles
            GROUP BY scrape_status
            ORDER BY scrape_status
            "#
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.scrape_status, r.count))
            .collect())
    }
}
