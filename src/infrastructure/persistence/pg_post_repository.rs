//! PostgreSQL implementation of blog post repository.

use async_trait::async_trait;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use super::like_pattern;
use crate::domain::entities::{
    Article, BlogPost, GeneratedImage, GeneratedPost, ImageType, NewImage, NewPost, PostPatch,
    PostStatus, ScrapeStatus,
};
use crate::domain::repositories::{PostFilter, PostRepository};
use crate::error::AppError;

const POST_COLUMNS: &str = "id, created_by, title, slug, content_markdown, content_html, excerpt, \
     source_cluster_id, generation_prompt, generation_model, generation_config, status, \
     published_at, meta_title, meta_description, created_at, updated_at";

/// PostgreSQL repository for blog posts, their sources and images.
pub struct PgPostRepository {
    pool: Arc<PgPool>,
}

impl PgPostRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn not_found(id: i64) -> AppError {
    AppError::not_found("Post not found", json!({ "id": id }))
}

fn filtered(select: &str, user_id: i64, filter: &PostFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM blog_posts WHERE created_by = ")
        .push_bind(user_id);

    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(cluster_id) = filter.source_cluster_id {
        qb.push(" AND source_cluster_id = ").push_bind(cluster_id);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR content_markdown ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR excerpt ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    qb
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, new_post: NewPost) -> Result<BlogPost, AppError> {
        let post = sqlx::query_as!(
            BlogPost,
            r#"
            INSERT INTO blog_posts
                (created_by, title, slug, content_markdown, excerpt, source_cluster_id,
                 status, meta_title, meta_description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, created_by, title, slug, content_markdown, content_html, excerpt,
                      source_cluster_id, generation_prompt, generation_model, generation_config,
                      status AS "status: PostStatus", published_at, meta_title, meta_description,
                      created_at, updated_at
            "#,
            new_post.created_by,
            new_post.title,
            new_post.slug,
            new_post.content_markdown,
            new_post.excerpt,
            new_post.source_cluster_id,
            new_post.status as PostStatus,
            new_post.meta_title,
            new_post.meta_description
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(post)
    }

    async fn create_for_job(&self, job_id: i64, new_post: NewPost) -> Result<BlogPost, AppError> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as!(
            BlogPost,
            r#"
            INSERT INTO blog_posts
                (created_by, title, slug, content_markdown, excerpt, source_cluster_id,
                 status, meta_title, meta_description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, created_by, title, slug, content_markdown, content_html, excerpt,
                      source_cluster_id, generation_prompt, generation_model, generation_config,
                      status AS "status: PostStatus", published_at, meta_title, meta_description,
                      created_at, updated_at
            "#,
            new_post.created_by,
            new_post.title,
            new_post.slug,
            new_post.content_markdown,
            new_post.excerpt,
            new_post.source_cluster_id,
            new_post.status as PostStatus,
            new_post.meta_title,
            new_post.meta_description
        )
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query!(
            "UPDATE generation_jobs SET blog_post_id = $2, updated_at = NOW() WHERE id = $1",
            job_id,
            post.id
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(post)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<BlogPost>, AppError> {
        let post = sqlx::query_as!(
            BlogPost,
            r#"
            SELECT id, created_by, title, slug, content_markdown, content_html, excerpt,
                   source_cluster_id, generation_prompt, generation_model, generation_config,
                   status AS "status: PostStatus", published_at, meta_title, meta_description,
                   created_at, updated_at
            FROM blog_posts
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(post)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar!(
            r#"SELECT EXISTS(SELECT 1 FROM blog_posts WHERE slug = $1) AS "exists!""#,
            slug
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn list(
        &self,
        user_id: i64,
        filter: PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<BlogPost>, AppError> {
        let mut qb = filtered(&format!("SELECT {POST_COLUMNS}"), user_id, &filter);

        let order = filter
            .ordering
            .map(|o| o.to_sql())
            .unwrap_or_else(|| "created_at DESC".to_string());
        qb.push(" ORDER BY ")
            .push(order)
            .push(", id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let posts = qb
            .build_query_as::<BlogPost>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(posts)
    }

    async fn count(&self, user_id: i64, filter: PostFilter) -> Result<i64, AppError> {
        let count = filtered("SELECT COUNT(*)", user_id, &filter)
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn update(&self, id: i64, patch: PostPatch) -> Result<BlogPost, AppError> {
        sqlx::query_as!(
            BlogPost,
            r#"
            UPDATE blog_posts
            SET title = COALESCE($2, title),
                content_markdown = COALESCE($3, content_markdown),
                content_html = COALESCE($4, content_html),
                excerpt = COALESCE($5, excerpt),
                status = COALESCE($6, status),
                meta_title = COALESCE($7, meta_title),
                meta_description = COALESCE($8, meta_description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, created_by, title, slug, content_markdown, content_html, excerpt,
                      source_cluster_id, generation_prompt, generation_model, generation_config,
                      status AS "status: PostStatus", published_at, meta_title, meta_description,
                      created_at, updated_at
            "#,
            id,
            patch.title,
            patch.content_markdown,
            patch.content_html,
            patch.excerpt,
            patch.status as Option<PostStatus>,
            patch.meta_title,
            patch.meta_description
        )
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| not_found(id))
    }

    async fn fill_generated(
        &self,
        id: i64,
        generated: GeneratedPost,
    ) -> Result<BlogPost, AppError> {
        let config = json!({ "model": generated.generation_model });
        sqlx::query_as!(
            BlogPost,
            r#"
            UPDATE blog_posts
            SET title = $2,
                slug = $3,
                excerpt = $4,
                content_markdown = $5,
                generation_prompt = $6,
                generation_model = $7,
                generation_config = $8,
                status = 'draft',
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, created_by, title, slug, content_markdown, content_html, excerpt,
                      source_cluster_id, generation_prompt, generation_model, generation_config,
                      status AS "status: PostStatus", published_at, meta_title, meta_description,
                      created_at, updated_at
            "#,
            id,
            generated.title,
            generated.slug,
            generated.excerpt,
            generated.content_markdown,
            generated.generation_prompt,
            generated.generation_model,
            config
        )
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| not_found(id))
    }

    async fn set_status(&self, id: i64, status: PostStatus) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE blog_posts SET status = $2, updated_at = NOW() WHERE id = $1",
            id,
            status as PostStatus
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn publish(&self, id: i64) -> Result<BlogPost, AppError> {
        sqlx::query_as!(
            BlogPost,
            r#"
            UPDATE blog_posts
            SET status = 'published', published_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING id, created_by, title, slug, content_markdown, content_html, excerpt,
                      source_cluster_id, generation_prompt, generation_model, generation_config,
                      status AS "status: PostStatus", published_at, meta_title, meta_description,
                      created_at, updated_at
            "#,
            id
        )
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query!("DELETE FROM blog_posts WHERE id = $1", id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_source_articles(
        &self,
        post_id: i64,
        article_ids: Vec<i64>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query!(
            "DELETE FROM blog_post_articles WHERE blog_post_id = $1",
            post_id
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query!(
            r#"
            INSERT INTO blog_post_articles (blog_post_id, article_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
            post_id,
            &article_ids[..]
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn source_articles(&self, post_id: i64) -> Result<Vec<Article>, AppError> {
        let articles = sqlx::query_as!(
            Article,
            r#"
            SELECT a.id, a.canonical_url, a.url_hash, a.title, a.author, a.publication,
                   a.publication_date, a.content_text, a.content_html, a.excerpt, a.word_count,
                   a.embedding, a.embedding_model, a.summary, a.topic_cluster_id,
                   a.similarity_to_cluster, a.scrape_status AS "scrape_status: ScrapeStatus",
                   a.scrape_error, a.scrape_attempts, a.last_scrape_at, a.og_image, a.language,
                   a.created_at, a.updated_at
            FROM blog_post_articles bpa
            JOIN articles a ON a.id = bpa.article_id
            WHERE bpa.blog_post_id = $1
            ORDER BY a.publication_date DESC NULLS LAST, a.id
            "#,
            post_id
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(articles)
    }

    async fn add_image(&self, image: NewImage) -> Result<GeneratedImage, AppError> {
        let image = sqlx::query_as!(
            GeneratedImage,
            r#"
            INSERT INTO generated_images
                (blog_post_id, image_type, prompt, generation_model, generation_config,
                 image_url, storage_path, width, height, alt_text)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, blog_post_id, image_type AS "image_type: ImageType", prompt,
                      negative_prompt, generation_model, generation_config, image_url,
                      storage_path, width, height, alt_text, created_at
            "#,
            image.blog_post_id,
            image.image_type as ImageType,
            image.prompt,
            image.generation_model,
            image.generation_config,
            image.image_url,
            image.storage_path,
            image.width,
            image.height,
            image.alt_text
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(image)
    }

    async fn images(&self, post_id: i64) -> Result<Vec<GeneratedImage>, AppError> {
        let images = sqlx::query_as!(
            GeneratedImage,
            r#"
            SELECT id, blog_post_id, image_type AS "image_type: ImageType", prompt,
                   negative_prompt, generation_model, generation_config, image_url,
                   storage_path, width, height, alt_text, created_at
            FROM generated_images
            WHERE blog_post_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
            post_id
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(images)
    }
}
