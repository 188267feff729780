//! PostgreSQL implementation of user repository.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{NewUser, User, UserPatch};
use crate::domain::repositories::UserRepository;
use crate::error::AppError;

/// PostgreSQL repository for user accounts.
pub struct PgUserRepository {
    pool: Arc<PgPool>,
}

impl PgUserRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as!(
            User,
            r#"
            SELECT id, email, name, google_id, avatar_url, is_active, is_admin, gmail_connected,
                   gmail_refresh_token, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as!(
            User,
            r#"
            SELECT id, email, name, google_id, avatar_url, is_active, is_admin, gmail_connected,
                   gmail_refresh_token, created_at, updated_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
            email
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as!(
            User,
            r#"
            SELECT id, email, name, google_id, avatar_url, is_active, is_admin, gmail_connected,
                   gmail_refresh_token, created_at, updated_at
            FROM users
            WHERE google_id = $1
            "#,
            google_id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let user = sqlx::query_as!(
            User,
            r#"
            INSERT INTO users (email, name, google_id, avatar_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, google_id, avatar_url, is_active, is_admin, gmail_connected,
                      gmail_refresh_token, created_at, updated_at
            "#,
            new_user.email,
            new_user.name,
            new_user.google_id,
            new_user.avatar_url
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<User, AppError> {
        sqlx::query_as!(
            User,
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                avatar_url = COALESCE($3, avatar_url),
                google_id = COALESCE($4, google_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, name, google_id, avatar_url, is_active, is_admin, gmail_connected,
                      gmail_refresh_token, created_at, updated_at
            "#,
            id,
            patch.name,
            patch.avatar_url,
            patch.google_id
        )
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| AppError::not_found("User not found", json!({ "id": id })))
    }

    async fn set_gmail_token(
        &self,
        id: i64,
        encrypted_token: Option<String>,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE users
            SET gmail_refresh_token = $2,
                gmail_connected = $2::text IS NOT NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
            id,
            encrypted_token
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool, AppError> {
        let result = sqlx::query!(
            "UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1",
            id,
            is_admin
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as!(
            User,
            r#"
            SELECT id, email, name, google_id, avatar_url, is_active, is_admin, gmail_connected,
                   gmail_refresh_token, created_at, updated_at
            FROM users
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
            limit,
            offset
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(users)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar!("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count.unwrap_or(0))
    }

    async fn list_gmail_connected(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as!(
            User,
            r#"
            SELECT id, email, name, google_id, avatar_url, is_active, is_admin, gmail_connected,
                   gmail_refresh_token, created_at, updated_at
            FROM users
            WHERE is_active AND gmail_connected AND gmail_refresh_token IS NOT NULL
            ORDER BY id
            "#
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(users)
    }
}
