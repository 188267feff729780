//! Article entity and scraping results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scraping lifecycle of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scrape_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Skipped,
}

/// A unique web article, keyed by its canonical URL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub canonical_url: String,
    pub url_hash: String,
    pub title: String,
    pub author: String,
    pub publication: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub content_text: String,
    pub content_html: String,
    pub excerpt: String,
    pub word_count: i32,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: String,
    pub summary: String,
    pub topic_cluster_id: Option<i64>,
    pub similarity_to_cluster: Option<f64>,
    pub scrape_status: ScrapeStatus,
    pub scrape_error: String,
    pub scrape_attempts: i32,
    pub last_scrape_at: Option<DateTime<Utc>>,
    pub og_image: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Text fed to the embedding model: title, blank line, body.
    pub fn embedding_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.content_text)
    }
}

/// Input data for registering a newly discovered article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub canonical_url: String,
    pub url_hash: String,
}

/// Content and metadata pulled out of a fetched page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedContent {
    pub title: String,
    pub author: String,
    pub publication: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub content_text: String,
    pub content_html: String,
    pub excerpt: String,
    pub word_count: i32,
    pub og_image: String,
    pub language: String,
}

/// Minimal projection used for brute-force similarity scans.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleEmbedding {
    pub id: i64,
    pub topic_cluster_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub embedding: Vec<f32>,
}

/// An article paired with its similarity to a reference vector.
#[derive(Debug, Clone)]
pub struct ScoredArticle {
    pub id: i64,
    pub topic_cluster_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub similarity: f64,
}

/// A recorded near-duplicate pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleDuplicate {
    pub id: i64,
    pub primary_article_id: i64,
    pub duplicate_article_id: i64,
    pub similarity_score: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) fn test_article(id: i64) -> Article {
    Article {
        id,
        canonical_url: format!("https://example.com/articles/story-{id}"),
        url_hash: format!("{id:064}"),
        title: format!("Story {id}"),
        author: String::new(),
        publication: "Example".to_string(),
        publication_date: None,
        content_text: "Body text ".repeat(40),
        content_html: String::new(),
        excerpt: String::new(),
        word_count: 80,
        embedding: None,
        embedding_model: String::new(),
        summary: String::new(),
        topic_cluster_id: None,
        similarity_to_cluster: None,
        scrape_status: ScrapeStatus::Success,
        scrape_error: String::new(),
        scrape_attempts: 1,
        last_scrape_at: None,
        og_image: String::new(),
        language: "en".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
