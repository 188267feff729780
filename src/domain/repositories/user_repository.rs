//! Repository trait for user accounts.

use crate::domain::entities::{NewUser, User, UserPatch};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for users.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgUserRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError>;

    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the email or Google id is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user does not exist.
    async fn update(&self, id: i64, patch: UserPatch) -> Result<User, AppError>;

    /// Stores (or clears) the encrypted Gmail refresh token and the
    /// `gmail_connected` flag in one write.
    async fn set_gmail_token(
        &self,
        id: i64,
        encrypted_token: Option<String>,
    ) -> Result<(), AppError>;

    async fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool, AppError>;

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>, AppError>;

    async fn count(&self) -> Result<i64, AppError>;

    /// Active users with a connected Gmail account.
    async fn list_gmail_connected(&self) -> Result<Vec<User>, AppError>;
}
