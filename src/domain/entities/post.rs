//! Blog posts and their generated images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Editorial state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Generating,
    Review,
    Published,
    Archived,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlogPost {
    pub id: i64,
    pub created_by: i64,
    pub title: String,
    pub slug: String,
    pub content_markdown: String,
    pub content_html: String,
    pub excerpt: String,
    pub source_cluster_id: Option<i64>,
    pub generation_prompt: String,
    pub generation_model: String,
    pub generation_config: Value,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub meta_title: String,
    pub meta_description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input data for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub created_by: i64,
    pub title: String,
    pub slug: String,
    pub content_markdown: String,
    pub excerpt: String,
    pub source_cluster_id: Option<i64>,
    pub status: PostStatus,
    pub meta_title: String,
    pub meta_description: String,
}

/// Partial update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content_markdown: Option<String>,
    pub content_html: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<PostStatus>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

/// Result of a model-written post, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPost {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content_markdown: String,
    pub generation_prompt: String,
    pub generation_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "image_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Header,
    Inline,
    Thumbnail,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GeneratedImage {
    pub id: i64,
    pub blog_post_id: i64,
    pub image_type: ImageType,
    pub prompt: String,
    pub negative_prompt: String,
    pub generation_model: String,
    pub generation_config: Value,
    pub image_url: String,
    pub storage_path: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub blog_post_id: i64,
    pub image_type: ImageType,
    pub prompt: String,
    pub generation_model: String,
    pub generation_config: Value,
    pub image_url: String,
    pub storage_path: String,
    pub width: i32,
    pub height: i32,
    pub alt_text: String,
}

#[cfg(test)]
pub(crate) fn test_post(id: i64, owner: i64) -> BlogPost {
    BlogPost {
        id,
        created_by: owner,
        title: format!("Post {id}"),
        slug: format!("post-{id}"),
        content_markdown: String::new(),
        content_html: String::new(),
        excerpt: String::new(),
        source_cluster_id: None,
        generation_prompt: String::new(),
        generation_model: String::new(),
        generation_config: Value::Object(Default::default()),
        status: PostStatus::Draft,
        published_at: None,
        meta_title: String::new(),
        meta_description: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
