//! PostgreSQL implementation of extracted-link repository.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use crate::domain::entities::{ExtractedLink, LinkStatus, NewExtractedLink};
use crate::domain::repositories::{LinkFilter, LinkRepository};
use crate::error::AppError;

const LINK_COLUMNS: &str = "l.id, l.email_id, l.raw_url, l.canonical_url, l.anchor_text, \
     l.surrounding_text, l.status, l.is_valid_article, l.article_id, l.created_at, l.updated_at";

/// PostgreSQL repository for links extracted from newsletters.
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn filtered(select: &str, user_id: i64, filter: &LinkFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(
        " FROM extracted_links l JOIN newsletter_emails e ON e.id = l.email_id WHERE e.user_id = ",
    )
    .push_bind(user_id);

    if let Some(status) = filter.status {
        qb.push(" AND l.status = ").push_bind(status);
    }
    if let Some(valid) = filter.is_valid_article {
        qb.push(" AND l.is_valid_article = ").push_bind(valid);
    }
    if let Some(email_id) = filter.email_id {
        qb.push(" AND l.email_id = ").push_bind(email_id);
    }

    qb
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn create(&self, new_link: NewExtractedLink) -> Result<Option<ExtractedLink>, AppError> {
        let link = sqlx::query_as!(
            ExtractedLink,
            r#"
            INSERT INTO extracted_links AS l
                (email_id, raw_url, canonical_url, anchor_text, surrounding_text, is_valid_article)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email_id, canonical_url) DO NOTHING
            RETURNING l.id, l.email_id, l.raw_url, l.canonical_url, l.anchor_text, l.surrounding_text,
                      l.status AS "status: LinkStatus", l.is_valid_article, l.article_id,
                      l.created_at, l.updated_at
            "#,
            new_link.email_id,
            new_link.raw_url,
            new_link.canonical_url,
            new_link.anchor_text,
            new_link.surrounding_text,
            new_link.is_valid_article
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ExtractedLink>, AppError> {
        let link = sqlx::query_as!(
            ExtractedLink,
            r#"
            SELECT l.id, l.email_id, l.raw_url, l.canonical_url, l.anchor_text, l.surrounding_text,
                   l.status AS "status: LinkStatus", l.is_valid_article, l.article_id,
                   l.created_at, l.updated_at
            FROM extracted_links l
            WHERE l.id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn find_with_owner(&self, id: i64) -> Result<Option<(ExtractedLink, i64)>, AppError> {
        let row = sqlx::query!(
            r#"
            SELECT l.id, l.email_id, l.raw_url, l.canonical_url, l.anchor_text, l.surrounding_text,
                   l.status AS "status: LinkStatus", l.is_valid_article, l.article_id,
                   l.created_at, l.updated_at,
                   e.user_id AS owner_id
            FROM extracted_links l
            JOIN newsletter_emails e ON e.id = l.email_id
            WHERE l.id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|r| {
            let link = ExtractedLink {
                id: r.id,
                email_id: r.email_id,
                raw_url: r.raw_url,
                canonical_url: r.canonical_url,
                anchor_text: r.anchor_text,
                surrounding_text: r.surrounding_text,
                status: r.status,
                is_valid_article: r.is_valid_article,
                article_id: r.article_id,
                created_at: r.created_at,
                updated_at: r.updated_at,
            };
            (link, r.owner_id)
        }))
    }

    async fn list_for_email(&self, email_id: i64) -> Result<Vec<ExtractedLink>, AppError> {
        let links = sqlx::query_as!(
            ExtractedLink,
            r#"
            SELECT l.id, l.email_id, l.raw_url, l.canonical_url, l.anchor_text, l.surrounding_text,
                   l.status AS "status: LinkStatus", l.is_valid_article, l.article_id,
                   l.created_at, l.updated_at
            FROM extracted_links l
            WHERE l.email_id = $1
            ORDER BY l.id
            "#,
            email_id
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn list_for_article(&self, article_id: i64) -> Result<Vec<ExtractedLink>, AppError> {
        let links = sqlx::query_as!(
            ExtractedLink,
            r#"
            SELECT l.id, l.email_id, l.raw_url, l.canonical_url, l.anchor_text, l.surrounding_text,
                   l.status AS "status: LinkStatus", l.is_valid_article, l.article_id,
                   l.created_at, l.updated_at
            FROM extracted_links l
            WHERE l.article_id = $1
            ORDER BY l.id
            "#,
            article_id
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn list(
        &self,
        user_id: i64,
        filter: LinkFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ExtractedLink>, AppError> {
        let mut qb = filtered(&format!("SELECT {LINK_COLUMNS}"), user_id, &filter);
        qb.push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let links = qb
            .build_query_as::<ExtractedLink>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(links)
    }

    async fn count(&self, user_id: i64, filter: LinkFilter) -> Result<i64, AppError> {
        let count = filtered("SELECT COUNT(*)", user_id, &filter)
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn set_status(
        &self,
        id: i64,
        status: LinkStatus,
        article_id: Option<i64>,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE extracted_links
            SET status = $2, article_id = COALESCE($3, article_id), updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            status as LinkStatus,
            article_id
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_all(&self, after_id: i64, limit: i64) -> Result<Vec<ExtractedLink>, AppError> {
        let links = sqlx::query_as!(
            ExtractedLink,
            r#"
            SELECT l.id, l.email_id, l.raw_url, l.canonical_url, l.anchor_text, l.surrounding_text,
                   l.status AS "status: LinkStatus", l.is_valid_article, l.article_id,
                   l.created_at, l.updated_at
            FROM extracted_links l
            WHERE l.id > $1
            ORDER BY l.id
            LIMIT $2
            "#,
            after_id,
            limit
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn set_valid_article(&self, id: i64, is_valid_article: bool) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE extracted_links SET is_valid_article = $2, updated_at = NOW() WHERE id = $1",
            id,
            is_valid_article
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
