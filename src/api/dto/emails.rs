//! DTOs for newsletter emails and their extracted links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use super::pagination::{PaginationParams, optional_rfc3339};
use crate::domain::entities::{ExtractedLink, LinkStatus, NewsletterEmail};

pub const EMAIL_ORDERING: &[&str] = &["received_date", "created_at"];

/// `GET /api/emails` query.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct EmailListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub is_processed: Option<bool>,
    pub sender: Option<String>,
    pub subject: Option<String>,
    #[serde(default, with = "optional_rfc3339")]
    pub received_after: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_rfc3339")]
    pub received_before: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// List representation; the HTML body is only included in the detail view.
#[derive(Debug, Serialize)]
pub struct EmailItem {
    pub id: i64,
    pub gmail_message_id: String,
    pub sender_email: String,
    pub sender_name: String,
    pub subject: String,
    pub received_date: DateTime<Utc>,
    pub snippet: String,
    pub is_processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub link_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<NewsletterEmail> for EmailItem {
    fn from(e: NewsletterEmail) -> Self {
        Self {
            id: e.id,
            gmail_message_id: e.gmail_message_id,
            sender_email: e.sender_email,
            sender_name: e.sender_name,
            subject: e.subject,
            received_date: e.received_date,
            snippet: e.snippet,
            is_processed: e.is_processed,
            processed_at: e.processed_at,
            link_count: e.link_count,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmailDetail {
    #[serde(flatten)]
    pub email: EmailItem,
    pub thread_id: String,
    pub raw_html: String,
    pub ai_summary: String,
    pub extracted_links: Vec<LinkItem>,
}

impl EmailDetail {
    pub fn new(email: NewsletterEmail, links: Vec<ExtractedLink>) -> Self {
        let thread_id = email.thread_id.clone();
        let raw_html = email.raw_html.clone();
        let ai_summary = email.ai_summary.clone();
        Self {
            email: email.into(),
            thread_id,
            raw_html,
            ai_summary,
            extracted_links: links.into_iter().map(LinkItem::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmailSummaryResponse {
    pub id: i64,
    pub ai_summary: String,
}

/// `GET /api/links` query.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct LinkListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    pub status: Option<LinkStatus>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub is_valid_article: Option<bool>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub email: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LinkItem {
    pub id: i64,
    pub email_id: i64,
    pub raw_url: String,
    pub canonical_url: String,
    pub anchor_text: String,
    pub surrounding_text: String,
    pub status: LinkStatus,
    pub is_valid_article: bool,
    pub article_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<ExtractedLink> for LinkItem {
    fn from(l: ExtractedLink) -> Self {
        Self {
            id: l.id,
            email_id: l.email_id,
            raw_url: l.raw_url,
            canonical_url: l.canonical_url,
            anchor_text: l.anchor_text,
            surrounding_text: l.surrounding_text,
            status: l.status,
            is_valid_article: l.is_valid_article,
            article_id: l.article_id,
            created_at: l.created_at,
        }
    }
}
