//! Repository trait for blog posts and their images.

use crate::domain::entities::{
    Article, BlogPost, GeneratedImage, GeneratedPost, NewImage, NewPost, PostPatch, PostStatus,
};
use crate::domain::repositories::SortOrder;
use crate::error::AppError;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub source_cluster_id: Option<i64>,
    /// Free-text search over title, body and excerpt.
    pub search: Option<String>,
    pub ordering: Option<SortOrder>,
}

/// Repository interface for blog posts.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgPostRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the slug is taken.
    async fn create(&self, new_post: NewPost) -> Result<BlogPost, AppError>;

    /// Creates a post and links it to generation job `job_id` in one
    /// transaction, so a retried job finds the post it already made.
    async fn create_for_job(&self, job_id: i64, new_post: NewPost) -> Result<BlogPost, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<BlogPost>, AppError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError>;

    async fn list(
        &self,
        user_id: i64,
        filter: PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<BlogPost>, AppError>;

    async fn count(&self, user_id: i64, filter: PostFilter) -> Result<i64, AppError>;

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the post does not exist.
    async fn update(&self, id: i64, patch: PostPatch) -> Result<BlogPost, AppError>;

    /// Overwrites a post with generated content and sets status `draft`.
    async fn fill_generated(&self, id: i64, generated: GeneratedPost)
    -> Result<BlogPost, AppError>;

    async fn set_status(&self, id: i64, status: PostStatus) -> Result<(), AppError>;

    /// Sets status `published` and `published_at = now()`.
    async fn publish(&self, id: i64) -> Result<BlogPost, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    /// Replaces the post's source article set.
    async fn set_source_articles(&self, post_id: i64, article_ids: Vec<i64>)
    -> Result<(), AppError>;

    async fn source_articles(&self, post_id: i64) -> Result<Vec<Article>, AppError>;

    async fn add_image(&self, image: NewImage) -> Result<GeneratedImage, AppError>;

    async fn images(&self, post_id: i64) -> Result<Vec<GeneratedImage>, AppError>;
}
