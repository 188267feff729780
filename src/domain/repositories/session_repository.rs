//! Repository trait for login sessions and API tokens.

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A session or CLI-issued bearer token.
///
/// Only the HMAC of the raw token is stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|e| e > now)
    }
}

/// Repository interface for session management.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgSessionRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_session.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if a session with the same hash already exists.
    async fn create(
        &self,
        user_id: i64,
        name: &str,
        token_hash: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Session, AppError>;

    /// Finds a session that is neither revoked nor expired.
    async fn find_active(&self, token_hash: &str) -> Result<Option<Session>, AppError>;

    async fn update_last_used(&self, token_hash: &str) -> Result<(), AppError>;

    /// Returns `true` if a live session was revoked.
    async fn revoke_by_hash(&self, token_hash: &str) -> Result<bool, AppError>;

    async fn revoke(&self, id: i64) -> Result<(), AppError>;

    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Session>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Session>, AppError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Session>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: Option<DateTime<Utc>>, revoked_at: Option<DateTime<Utc>>) -> Session {
        Session {
            id: 1,
            user_id: 1,
            name: "web".to_string(),
            token_hash: "h".to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            expires_at,
            revoked_at,
        }
    }

    #[test]
    fn test_session_usability() {
        let now = Utc::now();
        assert!(session(None, None).is_usable(now));
        assert!(session(Some(now + Duration::hours(1)), None).is_usable(now));
        assert!(!session(Some(now - Duration::seconds(1)), None).is_usable(now));
        assert!(!session(None, Some(now)).is_usable(now));
    }
}
