//! Mailbox provider.

use async_trait::async_trait;

use crate::domain::entities::MailMessage;

/// Read-only access to a user's mailbox.
///
/// # Implementations
///
/// - [`crate::infrastructure::google::GmailClient`] - Gmail REST API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Lists message ids matching a search query.
    async fn list_message_ids(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> anyhow::Result<Vec<String>>;

    /// Fetches and decodes one message.
    async fn get_message(&self, access_token: &str, message_id: &str)
    -> anyhow::Result<MailMessage>;
}
