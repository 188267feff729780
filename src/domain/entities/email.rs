//! Newsletter email entity.

use chrono::{DateTime, Utc};

/// A newsletter message fetched from the user's Gmail label.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NewsletterEmail {
    pub id: i64,
    pub user_id: i64,
    pub gmail_message_id: String,
    pub thread_id: String,
    pub sender_email: String,
    pub sender_name: String,
    pub subject: String,
    pub received_date: DateTime<Utc>,
    pub raw_html: String,
    pub snippet: String,
    pub is_processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub link_count: i32,
    pub ai_summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input data for storing a fetched message.
#[derive(Debug, Clone)]
pub struct NewEmail {
    pub user_id: i64,
    pub gmail_message_id: String,
    pub thread_id: String,
    pub sender_email: String,
    pub sender_name: String,
    pub subject: String,
    pub received_date: DateTime<Utc>,
    pub raw_html: String,
    pub snippet: String,
}

/// A message as returned by the mail provider, already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub id: String,
    pub thread_id: String,
    pub snippet: String,
    pub sender_email: String,
    pub sender_name: String,
    pub subject: String,
    pub received_date: DateTime<Utc>,
    pub html: String,
}

impl MailMessage {
    pub fn into_new_email(self, user_id: i64) -> NewEmail {
        NewEmail {
            user_id,
            gmail_message_id: self.id,
            thread_id: self.thread_id,
            sender_email: self.sender_email,
            sender_name: self.sender_name,
            subject: self.subject,
            received_date: self.received_date,
            raw_html: self.html,
            snippet: self.snippet,
        }
    }
}
