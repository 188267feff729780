//! DTOs for blog posts, generated images and generation jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use super::articles::ArticleItem;
use super::pagination::PaginationParams;
use crate::application::services::creator_service::{ManualPost, PostDetail};
use crate::domain::entities::{
    BlogPost, GeneratedImage, GenerationJob, ImageType, JobStatus, JobType, PostPatch, PostStatus,
};

pub const POST_ORDERING: &[&str] = &["created_at", "updated_at", "published_at", "title"];

/// `GET /api/posts` query.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    pub status: Option<PostStatus>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub source_cluster: Option<i64>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostItem {
    pub id: i64,
    pub created_by: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub source_cluster_id: Option<i64>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&BlogPost> for PostItem {
    fn from(p: &BlogPost) -> Self {
        Self {
            id: p.id,
            created_by: p.created_by,
            title: p.title.clone(),
            slug: p.slug.clone(),
            excerpt: p.excerpt.clone(),
            source_cluster_id: p.source_cluster_id,
            status: p.status,
            published_at: p.published_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl From<BlogPost> for PostItem {
    fn from(p: BlogPost) -> Self {
        Self::from(&p)
    }
}

/// A post with its body, generation metadata, images and sources.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: PostItem,
    pub content_markdown: String,
    pub content_html: String,
    pub generation_prompt: String,
    pub generation_model: String,
    pub generation_config: Value,
    pub meta_title: String,
    pub meta_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_articles: Option<Vec<ArticleItem>>,
}

impl From<BlogPost> for PostResponse {
    fn from(p: BlogPost) -> Self {
        Self {
            post: PostItem::from(&p),
            content_markdown: p.content_markdown,
            content_html: p.content_html,
            generation_prompt: p.generation_prompt,
            generation_model: p.generation_model,
            generation_config: p.generation_config,
            meta_title: p.meta_title,
            meta_description: p.meta_description,
            images: None,
            source_articles: None,
        }
    }
}

impl From<PostDetail> for PostResponse {
    fn from(d: PostDetail) -> Self {
        let mut response = Self::from(d.post);
        response.images = Some(d.images.into_iter().map(ImageItem::from).collect());
        response.source_articles = Some(
            d.source_articles
                .into_iter()
                .map(ArticleItem::from)
                .collect(),
        );
        response
    }
}

#[derive(Debug, Serialize)]
pub struct ImageItem {
    pub id: i64,
    pub image_type: ImageType,
    pub prompt: String,
    pub generation_model: String,
    pub image_url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt_text: String,
    pub created_at: DateTime<Utc>,
}

impl From<GeneratedImage> for ImageItem {
    fn from(i: GeneratedImage) -> Self {
        Self {
            id: i.id,
            image_type: i.image_type,
            prompt: i.prompt,
            generation_model: i.generation_model,
            image_url: i.image_url,
            width: i.width,
            height: i.height,
            alt_text: i.alt_text,
            created_at: i.created_at,
        }
    }
}

/// `POST /api/posts` body.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: String,
    #[serde(default)]
    pub content_markdown: String,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Excerpt must be at most 1000 characters"))]
    pub excerpt: String,
    pub source_cluster_id: Option<i64>,
    pub status: Option<PostStatus>,
}

impl From<CreatePostRequest> for ManualPost {
    fn from(r: CreatePostRequest) -> Self {
        ManualPost {
            title: r.title,
            content_markdown: r.content_markdown,
            excerpt: r.excerpt,
            source_cluster_id: r.source_cluster_id,
            status: r.status,
        }
    }
}

/// `PATCH /api/posts/{id}` body. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: Option<String>,
    pub content_markdown: Option<String>,
    pub content_html: Option<String>,
    #[validate(length(max = 1000, message = "Excerpt must be at most 1000 characters"))]
    pub excerpt: Option<String>,
    pub status: Option<PostStatus>,
    #[validate(length(max = 255, message = "Meta title must be at most 255 characters"))]
    pub meta_title: Option<String>,
    #[validate(length(max = 500, message = "Meta description must be at most 500 characters"))]
    pub meta_description: Option<String>,
}

impl From<UpdatePostRequest> for PostPatch {
    fn from(r: UpdatePostRequest) -> Self {
        PostPatch {
            title: r.title,
            content_markdown: r.content_markdown,
            content_html: r.content_html,
            excerpt: r.excerpt,
            status: r.status,
            meta_title: r.meta_title,
            meta_description: r.meta_description,
        }
    }
}

/// `POST /api/posts/generate` body.
#[derive(Debug, Deserialize, Validate)]
pub struct GeneratePostRequest {
    pub cluster_id: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 4000, message = "Prompt must be at most 4000 characters"))]
    pub custom_prompt: String,
}

/// `POST /api/posts/{id}/generate_image` body.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerateImageRequest {
    #[serde(default)]
    #[validate(length(max = 2000, message = "Prompt must be at most 2000 characters"))]
    pub prompt: String,
}

/// `GET /api/jobs` query.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
}

#[derive(Debug, Serialize)]
pub struct JobItem {
    pub id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub blog_post_id: Option<i64>,
    pub cluster_id: Option<i64>,
    pub input_data: Value,
    pub output_data: Value,
    pub error_message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<GenerationJob> for JobItem {
    fn from(j: GenerationJob) -> Self {
        let duration_seconds = j.duration_seconds();
        Self {
            id: j.id,
            job_type: j.job_type,
            status: j.status,
            blog_post_id: j.blog_post_id,
            cluster_id: j.cluster_id,
            input_data: j.input_data,
            output_data: j.output_data,
            error_message: j.error_message,
            started_at: j.started_at,
            completed_at: j.completed_at,
            duration_seconds,
            created_at: j.created_at,
        }
    }
}
