//! DTOs for articles and similarity search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use super::emails::LinkItem;
use super::pagination::{PaginationParams, optional_rfc3339};
use crate::domain::entities::{Article, ExtractedLink, ScrapeStatus};

pub const ARTICLE_ORDERING: &[&str] = &["publication_date", "created_at", "word_count"];

pub const DEFAULT_SIMILAR_THRESHOLD: f64 = 0.85;
pub const DEFAULT_SIMILAR_LIMIT: i64 = 10;
const MAX_SIMILAR_LIMIT: i64 = 100;

/// `GET /api/articles` query.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    pub scrape_status: Option<ScrapeStatus>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub topic_cluster: Option<i64>,
    pub publication: Option<String>,
    pub title: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub has_cluster: Option<bool>,
    #[serde(default, with = "optional_rfc3339")]
    pub published_after: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_rfc3339")]
    pub published_before: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// `GET /api/articles/similar` query.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub article_id: Option<i64>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SimilarQuery {
    pub fn threshold(&self) -> f64 {
        self.threshold
            .unwrap_or(DEFAULT_SIMILAR_THRESHOLD)
            .clamp(0.0, 1.0)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_SIMILAR_LIMIT)
            .clamp(1, MAX_SIMILAR_LIMIT)
    }
}

/// List representation without the article body.
#[derive(Debug, Serialize)]
pub struct ArticleItem {
    pub id: i64,
    pub canonical_url: String,
    pub title: String,
    pub author: String,
    pub publication: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub excerpt: String,
    pub word_count: i32,
    pub summary: String,
    pub topic_cluster_id: Option<i64>,
    pub similarity_to_cluster: Option<f64>,
    pub scrape_status: ScrapeStatus,
    pub has_embedding: bool,
    pub og_image: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl From<Article> for ArticleItem {
    fn from(a: Article) -> Self {
        let has_embedding = a.has_embedding();
        Self {
            id: a.id,
            canonical_url: a.canonical_url,
            title: a.title,
            author: a.author,
            publication: a.publication,
            publication_date: a.publication_date,
            excerpt: a.excerpt,
            word_count: a.word_count,
            summary: a.summary,
            topic_cluster_id: a.topic_cluster_id,
            similarity_to_cluster: a.similarity_to_cluster,
            scrape_status: a.scrape_status,
            has_embedding,
            og_image: a.og_image,
            language: a.language,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub article: ArticleItem,
    pub content_text: String,
    pub content_html: String,
    pub scrape_error: String,
    pub scrape_attempts: i32,
    pub last_scrape_at: Option<DateTime<Utc>>,
    pub embedding_model: String,
    pub source_links: Vec<LinkItem>,
}

impl ArticleDetail {
    pub fn new(article: Article, links: Vec<ExtractedLink>) -> Self {
        let content_text = article.content_text.clone();
        let content_html = article.content_html.clone();
        let scrape_error = article.scrape_error.clone();
        let scrape_attempts = article.scrape_attempts;
        let last_scrape_at = article.last_scrape_at;
        let embedding_model = article.embedding_model.clone();
        Self {
            article: article.into(),
            content_text,
            content_html,
            scrape_error,
            scrape_attempts,
            last_scrape_at,
            embedding_model,
            source_links: links.into_iter().map(LinkItem::from).collect(),
        }
    }
}
