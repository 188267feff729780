//! Links extracted from newsletter emails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of an extracted link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "link_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Valid,
    Invalid,
    Duplicate,
    Error,
}

/// A link found in a newsletter, pointing at a (possible) article.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExtractedLink {
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
    pub updated_at: DateTime<Utc>,
}

/// Input data for recording a link.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExtractedLink {
    pub email_id: i64,
    pub raw_url: String,
    pub canonical_url: String,
    pub anchor_text: String,
    pub surrounding_text: String,
    pub is_valid_article: bool,
}
