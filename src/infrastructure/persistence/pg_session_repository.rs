//! PostgreSQL implementation of session repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::repositories::{Session, SessionRepository};
use crate::error::AppError;

/// PostgreSQL repository for sessions and API tokens.
///
/// Stores HMAC hashes of tokens. Raw tokens are never persisted.
pub struct PgSessionRepository {
    pool: Arc<PgPool>,
}

impl PgSessionRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(
        &self,
        user_id: i64,
        name: &str,
        token_hash: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Session, AppError> {
        let session = sqlx::query_as!(
            Session,
            r#"
            INSERT INTO sessions (user_id, name, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, token_hash, created_at, last_used_at, expires_at, revoked_at
            "#,
            user_id,
            name,
            token_hash,
            expires_at
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    async fn find_active(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as!(
            Session,
            r#"
            SELECT id, user_id, name, token_hash, created_at, last_used_at, expires_at, revoked_at
            FROM sessions
            WHERE token_hash = $1
              AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
            token_hash
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    async fn update_last_used(&self, token_hash: &str) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE sessions
            SET last_used_at = NOW()
            WHERE token_hash = $1
              AND revoked_at IS NULL
            "#,
            token_hash
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn revoke_by_hash(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query!(
            "UPDATE sessions SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
            token_hash
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke(&self, id: i64) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
            id
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Session>, AppError> {
        let sessions = sqlx::query_as!(
            Session,
            r#"
            SELECT id, user_id, name, token_hash, created_at, last_used_at, expires_at, revoked_at
            FROM sessions
            WHERE ($1::bigint IS NULL OR user_id = $1)
            ORDER BY created_at DESC
            "#,
            user_id
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(sessions)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as!(
            Session,
            r#"
            SELECT id, user_id, name, token_hash, created_at, last_used_at, expires_at, revoked_at
            FROM sessions
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as!(
            Session,
            r#"
            SELECT id, user_id, name, token_hash, created_at, last_used_at, expires_at, revoked_at
            FROM sessions
            WHERE name = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            name
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }
}
