//! Repository trait for newsletter emails.

use chrono::{DateTime, Utc};

use crate::domain::entities::{NewEmail, NewsletterEmail};
use crate::domain::repositories::SortOrder;
use crate::error::AppError;
use async_trait::async_trait;

/// Filters for listing a user's emails.
#[derive(Debug, Clone, Default)]
pub struct EmailFilter {
    pub is_processed: Option<bool>,
    /// Case-insensitive substring of sender name or address.
    pub sender: Option<String>,
    /// Case-insensitive substring of the subject.
    pub subject: Option<String>,
    pub received_after: Option<DateTime<Utc>>,
    pub received_before: Option<DateTime<Utc>>,
    /// Free-text search over subject, sender and snippet.
    pub search: Option<String>,
    pub ordering: Option<SortOrder>,
}

/// Repository interface for newsletter emails.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgEmailRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// Returns which of `message_ids` are already stored for the user.
    async fn existing_message_ids(
        &self,
        user_id: i64,
        message_ids: Vec<String>,
    ) -> Result<Vec<String>, AppError>;

    /// Inserts an email, returning `None` when the message was already stored.
    async fn create(&self, new_email: NewEmail) -> Result<Option<NewsletterEmail>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<NewsletterEmail>, AppError>;

    async fn list(
        &self,
        user_id: i64,
        filter: EmailFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<NewsletterEmail>, AppError>;

    async fn count(&self, user_id: i64, filter: EmailFilter) -> Result<i64, AppError>;

    async fn set_link_count(&self, id: i64, link_count: i32) -> Result<(), AppError>;

    async fn mark_processed(&self, id: i64) -> Result<(), AppError>;

    async fn set_summary(&self, id: i64, summary: &str) -> Result<(), AppError>;

    /// Most recent `received_date` stored for the user.
    async fn latest_received(&self, user_id: i64) -> Result<Option<DateTime<Utc>>, AppError>;
}
