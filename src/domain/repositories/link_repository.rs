//! Repository trait for links extracted from emails.

use crate::domain::entities::{ExtractedLink, LinkStatus, NewExtractedLink};
use crate::error::AppError;
use async_trait::async_trait;

/// Filters for listing a user's extracted links.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pub status: Option<LinkStatus>,
    pub is_valid_article: Option<bool>,
    pub email_id: Option<i64>,
}

/// Repository interface for extracted links.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_link.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Inserts a link, returning `None` if the email already has one with the
    /// same canonical URL.
    async fn create(&self, new_link: NewExtractedLink) -> Result<Option<ExtractedLink>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ExtractedLink>, AppError>;

    /// Finds a link and the id of the user owning its email.
    async fn find_with_owner(&self, id: i64) -> Result<Option<(ExtractedLink, i64)>, AppError>;

    async fn list_for_email(&self, email_id: i64) -> Result<Vec<ExtractedLink>, AppError>;

    async fn list_for_article(&self, article_id: i64) -> Result<Vec<ExtractedLink>, AppError>;

    async fn list(
        &self,
        user_id: i64,
        filter: LinkFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ExtractedLink>, AppError>;

    async fn count(&self, user_id: i64, filter: LinkFilter) -> Result<i64, AppError>;

    async fn set_status(
        &self,
        id: i64,
        status: LinkStatus,
        article_id: Option<i64>,
    ) -> Result<(), AppError>;

    /// Pages through every link, oldest first (used for re-validation).
    async fn list_all(&self, after_id: i64, limit: i64) -> Result<Vec<ExtractedLink>, AppError>;

    async fn set_valid_article(&self, id: i64, is_valid_article: bool) -> Result<(), AppError>;
}
