//! PostgreSQL implementation of email repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use super::like_pattern;
use crate::domain::entities::{NewEmail, NewsletterEmail};
use crate::domain::repositories::{EmailFilter, EmailRepository};
use crate::error::AppError;

const EMAIL_COLUMNS: &str = "id, user_id, gmail_message_id, thread_id, sender_email, sender_name, \
     subject, received_date, raw_html, snippet, is_processed, processed_at, link_count, \
     ai_summary, created_at, updated_at";

/// PostgreSQL repository for newsletter emails.
pub struct PgEmailRepository {
    pool: Arc<PgPool>,
}

impl PgEmailRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn filtered(select: &str, user_id: i64, filter: &EmailFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM newsletter_emails WHERE user_id = ")
        .push_bind(user_id);

    if let Some(processed) = filter.is_processed {
        qb.push(" AND is_processed = ").push_bind(processed);
    }
    if let Some(sender) = &filter.sender {
        let pattern = like_pattern(sender);
        qb.push(" AND (sender_email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sender_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(subject) = &filter.subject {
        qb.push(" AND subject ILIKE ").push_bind(like_pattern(subject));
    }
    if let Some(after) = filter.received_after {
        qb.push(" AND received_date >= ").push_bind(after);
    }
    if let Some(before) = filter.received_before {
        qb.push(" AND received_date <= ").push_bind(before);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (subject ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sender_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sender_email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR snippet ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    qb
}

#[async_trait]
impl EmailRepository for PgEmailRepository {
    async fn existing_message_ids(
        &self,
        user_id: i64,
        message_ids: Vec<String>,
    ) -> Result<Vec<String>, AppError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = sqlx::query_scalar!(
            r#"
            SELECT gmail_message_id
            FROM newsletter_emails
            WHERE user_id = $1 AND gmail_message_id = ANY($2)
            "#,
            user_id,
            &message_ids[..]
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ids)
    }

    async fn create(&self, new_email: NewEmail) -> Result<Option<NewsletterEmail>, AppError> {
        let email = sqlx::query_as!(
            NewsletterEmail,
            r#"
            INSERT INTO newsletter_emails
                (user_id, gmail_message_id, thread_id, sender_email, sender_name,
                 subject, received_date, raw_html, snippet)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, gmail_message_id) DO NOTHING
            RETURNING id, user_id, gmail_message_id, thread_id, sender_email, sender_name, subject,
                      received_date, raw_html, snippet, is_processed, processed_at, link_count,
                      ai_summary, created_at, updated_at
            "#,
            new_email.user_id,
            new_email.gmail_message_id,
            new_email.thread_id,
            new_email.sender_email,
            new_email.sender_name,
            new_email.subject,
            new_email.received_date,
            new_email.raw_html,
            new_email.snippet
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(email)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<NewsletterEmail>, AppError> {
        let email = sqlx::query_as!(
            NewsletterEmail,
            r#"
            SELECT id, user_id, gmail_message_id, thread_id, sender_email, sender_name, subject,
                   received_date, raw_html, snippet, is_processed, processed_at, link_count,
                   ai_summary, created_at, updated_at
            FROM newsletter_emails
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(email)
    }

    async fn list(
        &self,
        user_id: i64,
        filter: EmailFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<NewsletterEmail>, AppError> {
        let mut qb = filtered(&format!("SELECT {EMAIL_COLUMNS}"), user_id, &filter);

        let order = filter
            .ordering
            .map(|o| o.to_sql())
            .unwrap_or_else(|| "received_date DESC".to_string());
        qb.push(" ORDER BY ")
            .push(order)
            .push(", id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let emails = qb
            .build_query_as::<NewsletterEmail>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(emails)
    }

    async fn count(&self, user_id: i64, filter: EmailFilter) -> Result<i64, AppError> {
        let count = filtered("SELECT COUNT(*)", user_id, &filter)
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn set_link_count(&self, id: i64, link_count: i32) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE newsletter_emails SET link_count = $2, updated_at = NOW() WHERE id = $1",
            id,
            link_count
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn mark_processed(&self, id: i64) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE newsletter_emails
            SET is_processed = TRUE, processed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
            id
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn set_summary(&self, id: i64, summary: &str) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE newsletter_emails SET ai_summary = $2, updated_at = NOW() WHERE id = $1",
            id,
            summary
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn latest_received(&self, user_id: i64) -> Result<Option<DateTime<Utc>>, AppError> {
        let latest = sqlx::query_scalar!(
            "SELECT MAX(received_date) FROM newsletter_emails WHERE user_id = $1",
            user_id
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(latest)
    }
}
