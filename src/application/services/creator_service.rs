//! Generated content: cluster summaries, blog posts and header images.
//!
//! User-triggered generation is tracked by a [`GenerationJob`] created when
//! the request is accepted. The background task moves the job to
//! `in_progress` and completes it; failures that outlive the task's retries
//! are recorded by the worker pipeline.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::application::services::unique_slug;
use crate::domain::entities::{
    Article, BlogPost, GeneratedImage, GeneratedPost, GenerationJob, ImageType, JobType, NewImage,
    NewJob, NewPost, PostPatch, PostStatus, TopicCluster, User,
};
use crate::domain::providers::{AiProvider, MediaStore, TextOptions};
use crate::domain::repositories::{
    ArticleRepository, ClusterRepository, JobFilter, JobRepository, PostFilter, PostRepository,
};
use crate::domain::task::Task;
use crate::error::AppError;
use crate::utils::text::{slugify, truncate};

const SOURCE_ARTICLES: i64 = 10;
const MIN_ARTICLES_FOR_POST: i32 = 2;
const FALLBACK_TITLE: &str = "AI News Update";
const EXCERPT_FALLBACK_CHARS: usize = 200;
const HEADER_WIDTH: i32 = 1920;
const HEADER_HEIGHT: i32 = 1080;
const HEADER_ASPECT_RATIO: &str = "16:9";

/// Fields of a manually written post.
#[derive(Debug, Clone)]
pub struct ManualPost {
    pub title: String,
    pub content_markdown: String,
    pub excerpt: String,
    pub source_cluster_id: Option<i64>,
    pub status: Option<PostStatus>,
}

/// A post with everything its detail view shows.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: BlogPost,
    pub images: Vec<GeneratedImage>,
    pub source_articles: Vec<Article>,
}

/// Splits a model response into title, excerpt and markdown body.
///
/// Expects `TITLE:` and `EXCERPT:` lines followed by a `CONTENT:` marker;
/// everything after the marker is the body. Missing parts fall back to the
/// first `# ` heading of the body (title) and its first 200 characters
/// (excerpt).
pub fn parse_blog_response(text: &str) -> (String, String, String) {
    let mut title = String::new();
    let mut excerpt = String::new();
    let mut content_lines = Vec::new();
    let mut in_content = false;

    for line in text.trim().lines() {
        if let Some(rest) = line.strip_prefix("TITLE:") {
            title = rest.trim().to_string();
            in_content = false;
        } else if let Some(rest) = line.strip_prefix("EXCERPT:") {
            excerpt = rest.trim().to_string();
            in_content = false;
        } else if line.starts_with("CONTENT:") {
            in_content = true;
        } else if in_content {
            content_lines.push(line);
        }
    }

    let content = content_lines.join("\n").trim().to_string();

    if title.is_empty() {
        title = content
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .map(|h| h.trim().to_string())
            .unwrap_or_default();
    }
    if title.is_empty() {
        title = FALLBACK_TITLE.to_string();
    }

    if excerpt.is_empty() {
        excerpt = if content.chars().count() > EXCERPT_FALLBACK_CHARS {
            format!("{}...", truncate(&content, EXCERPT_FALLBACK_CHARS))
        } else {
            content.clone()
        };
    }

    (title, excerpt, content)
}

fn format_date(article: &Article) -> Option<String> {
    article
        .publication_date
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn cluster_summary_prompt(cluster: &TopicCluster, articles: &[Article]) -> String {
    let context: String = articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let summary = if a.excerpt.is_empty() {
                truncate(&a.content_text, 500)
            } else {
                a.excerpt.as_str()
            };
            format!(
                "\nArticle {}: {}\nSource: {}\nDate: {}\nSummary: {}\n",
                i + 1,
                a.title,
                if a.publication.is_empty() { "Unknown" } else { a.publication.as_str() },
                format_date(a).unwrap_or_else(|| "Unknown".to_string()),
                summary
            )
        })
        .collect();

    format!(
        "You are an AI news analyst. Summarize the following collection of articles about the same topic.\n\n\
         Topic: {}\n\n\
         Articles:\n{context}\n\n\
         Provide a comprehensive 2-3 paragraph summary that:\n\
         1. Identifies the main theme and key developments\n\
         2. Highlights the most significant points across all articles\n\
         3. Notes any different perspectives or conflicting information\n\
         4. Mentions the timeframe and sources covered\n\n\
         Write in a professional, journalistic style.",
        cluster.name
    )
}

fn blog_post_prompt(cluster: &TopicCluster, articles: &[Article], custom: &str) -> String {
    let sources = articles
        .iter()
        .map(|a| {
            format!(
                "\nTitle: {}\nSource: {}\nDate: {}\nContent: {}\nURL: {}\n",
                a.title,
                if a.publication.is_empty() { a.canonical_url.as_str() } else { a.publication.as_str() },
                format_date(a).unwrap_or_else(|| "N/A".to_string()),
                truncate(&a.content_text, 1500),
                a.canonical_url
            )
        })
        .collect::<Vec<_>>()
        .join("---");

    let extra = if custom.trim().is_empty() {
        String::new()
    } else {
        format!("Additional instructions: {}", custom.trim())
    };

    format!(
        "You are an expert technology journalist writing for a blog about AI news and developments.\n\n\
         Write a comprehensive, engaging blog post based on the following source articles about: {}\n\n\
         Source Articles:\n{sources}\n\n\
         Requirements:\n\
         1. Write a compelling headline\n\
         2. Start with an engaging introduction that hooks the reader\n\
         3. Cover the main developments and key points from all sources\n\
         4. Include proper attribution and citations to source articles (use markdown links)\n\
         5. Provide your analysis and insights on the implications\n\
         6. End with a conclusion that summarizes the key takeaways\n\
         7. Use markdown formatting (headers, bold, bullet points where appropriate)\n\
         8. Target 800-1200 words\n\
         9. Write in an informative but accessible style\n\n\
         {extra}\n\n\
         Format your response as:\n\
         TITLE: [Your headline]\n\
         EXCERPT: [A 1-2 sentence summary for preview]\n\
         CONTENT:\n\
         [Your full blog post in markdown]\n",
        cluster.name
    )
}

fn image_prompt(post: &BlogPost) -> String {
    format!(
        "Create a professional, modern illustration for a technology blog post titled: \"{}\"\n\n\
         The image should:\n\
         - Be suitable as a blog header image\n\
         - Have a clean, professional tech aesthetic\n\
         - Use a modern color palette\n\
         - Not include any text or words\n\
         - Convey themes of AI, technology, and innovation\n\
         - Be visually striking and attention-grabbing",
        post.title
    )
}

/// The Creator: writes summaries, posts and images from clustered articles.
pub struct CreatorService<A, C, P, J>
where
    A: ArticleRepository,
    C: ClusterRepository,
    P: PostRepository,
    J: JobRepository,
{
    articles: Arc<A>,
    clusters: Arc<C>,
    posts: Arc<P>,
    jobs: Arc<J>,
    ai: Arc<dyn AiProvider>,
    media: Arc<dyn MediaStore>,
}

impl<A, C, P, J> CreatorService<A, C, P, J>
where
    A: ArticleRepository,
    C: ClusterRepository,
    P: PostRepository,
    J: JobRepository,
{
    pub fn new(
        articles: Arc<A>,
        clusters: Arc<C>,
        posts: Arc<P>,
        jobs: Arc<J>,
        ai: Arc<dyn AiProvider>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            articles,
            clusters,
            posts,
            jobs,
            ai,
            media,
        }
    }

    async fn require_cluster(&self, id: i64) -> Result<TopicCluster, AppError> {
        self.clusters
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Cluster not found", json!({ "id": id })))
    }

    async fn require_post(&self, id: i64) -> Result<BlogPost, AppError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Post not found", json!({ "id": id })))
    }

    async fn owned_post(&self, viewer: &User, id: i64) -> Result<BlogPost, AppError> {
        let post = self.require_post(id).await?;
        if !viewer.can_access(post.created_by) {
            return Err(AppError::not_found("Post not found", json!({ "id": id })));
        }
        Ok(post)
    }

    async fn post_slug(&self, title: &str) -> Result<String, AppError> {
        let mut base = truncate(&slugify(title), 200).to_string();
        if base.is_empty() {
            base = "post".to_string();
        }
        let posts = &self.posts;
        unique_slug(&base, |s| async move { posts.slug_exists(&s).await }).await
    }

    async fn generation(&self, prompt: &str) -> Result<String, AppError> {
        self.ai
            .generate_text(prompt, TextOptions::default())
            .await
            .map_err(|e| AppError::from_provider("Text generation failed", &e))
    }

    // ── Background work ─────────────────────────────────────────────────

    /// Writes the cluster's master summary from its newest scraped articles.
    ///
    /// Returns `None` when the cluster has no scraped articles.
    pub async fn summarize_cluster(
        &self,
        cluster_id: i64,
        job_id: Option<i64>,
    ) -> Result<Option<String>, AppError> {
        if let Some(job_id) = job_id {
            self.jobs.start(job_id).await?;
        }

        let cluster = self.require_cluster(cluster_id).await?;
        let articles = self
            .articles
            .list_scraped_in_cluster(cluster_id, SOURCE_ARTICLES)
            .await?;

        if articles.is_empty() {
            tracing::warn!(cluster_id, "No scraped articles to summarize");
            if let Some(job_id) = job_id {
                self.jobs
                    .fail(job_id, "No scraped articles in cluster")
                    .await?;
            }
            return Ok(None);
        }

        let summary = self
            .generation(&cluster_summary_prompt(&cluster, &articles))
            .await?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(AppError::upstream(
                "Model returned no summary",
                json!({ "cluster_id": cluster_id }),
            ));
        }

        self.clusters.set_summary(cluster_id, summary).await?;
        if let Some(job_id) = job_id {
            self.jobs
                .complete(job_id, json!({ "cluster_id": cluster_id }), None)
                .await?;
        }

        tracing::info!(cluster_id, name = %cluster.name, "Generated cluster summary");
        Ok(Some(summary.to_string()))
    }

    /// Writes a blog post from a cluster.
    ///
    /// Fills `draft_post_id` when given, otherwise the post attached to the
    /// job, creating it on the first attempt. The post is left as a draft
    /// linked to its source articles.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when the cluster has no scraped
    /// articles, [`AppError::NotFound`] for a missing cluster or draft, and
    /// [`AppError::Upstream`] when generation fails.
    pub async fn generate_post(
        &self,
        job_id: i64,
        user_id: i64,
        cluster_id: i64,
        custom_prompt: &str,
        draft_post_id: Option<i64>,
    ) -> Result<BlogPost, AppError> {
        self.jobs.start(job_id).await?;

        let cluster = self.require_cluster(cluster_id).await?;
        let articles = self
            .articles
            .list_scraped_in_cluster(cluster_id, SOURCE_ARTICLES)
            .await?;
        if articles.is_empty() {
            return Err(AppError::bad_request(
                "No scraped articles in cluster",
                json!({ "cluster_id": cluster_id }),
            ));
        }

        let prompt = blog_post_prompt(&cluster, &articles, custom_prompt);
        let response = self.generation(&prompt).await?;
        let (title, excerpt, content) = parse_blog_response(&response);
        let slug = self.post_slug(&title).await?;

        let generated = GeneratedPost {
            title,
            slug,
            excerpt,
            content_markdown: content,
            generation_prompt: prompt,
            generation_model: self.ai.generation_model(),
        };

        let post_id = match draft_post_id {
            Some(id) => id,
            None => {
                self.job_post(job_id, user_id, cluster_id, &generated)
                    .await?
            }
        };

        let post = self.posts.fill_generated(post_id, generated).await?;
        self.posts
            .set_source_articles(post.id, articles.iter().map(|a| a.id).collect())
            .await?;
        self.jobs
            .complete(job_id, json!({ "blog_post_id": post.id }), Some(post.id))
            .await?;

        tracing::info!(post_id = post.id, title = %post.title, "Generated blog post");
        Ok(post)
    }

    /// The post attached to `job_id`, created on the job's first attempt.
    async fn job_post(
        &self,
        job_id: i64,
        user_id: i64,
        cluster_id: i64,
        generated: &GeneratedPost,
    ) -> Result<i64, AppError> {
        let attached = self
            .jobs
            .find_by_id(job_id)
            .await?
            .and_then(|job| job.blog_post_id);
        if let Some(post_id) = attached {
            tracing::debug!(job_id, post_id, "Reusing post from earlier attempt");
            return Ok(post_id);
        }

        let post = self
            .posts
            .create_for_job(
                job_id,
                NewPost {
                    created_by: user_id,
                    title: generated.title.clone(),
                    slug: generated.slug.clone(),
                    content_markdown: String::new(),
                    excerpt: String::new(),
                    source_cluster_id: Some(cluster_id),
                    status: PostStatus::Generating,
                    meta_title: String::new(),
                    meta_description: String::new(),
                },
            )
            .await?;
        Ok(post.id)
    }

    /// Generates and stores a header image for a post.
    pub async fn generate_image(
        &self,
        job_id: i64,
        post_id: i64,
        custom_prompt: &str,
    ) -> Result<GeneratedImage, AppError> {
        self.jobs.start(job_id).await?;
        let post = self.require_post(post_id).await?;

        let prompt = if custom_prompt.trim().is_empty() {
            image_prompt(&post)
        } else {
            custom_prompt.trim().to_string()
        };

        let bytes = self
            .ai
            .generate_image(&prompt, HEADER_ASPECT_RATIO)
            .await
            .map_err(|e| AppError::from_provider("Image generation failed", &e))?;
        if bytes.is_empty() {
            return Err(AppError::upstream(
                "No images generated",
                json!({ "post_id": post_id }),
            ));
        }

        let path = format!("generated/{post_id}/{}.png", Uuid::new_v4());
        let stored = self.media.save(&path, bytes).await.map_err(|e| {
            AppError::internal("Failed to store image", json!({ "reason": format!("{e:#}") }))
        })?;

        let image = self
            .posts
            .add_image(NewImage {
                blog_post_id: post.id,
                image_type: ImageType::Header,
                prompt,
                generation_model: self.ai.image_model(),
                generation_config: json!({ "aspect_ratio": HEADER_ASPECT_RATIO }),
                image_url: stored.url,
                storage_path: stored.path,
                width: HEADER_WIDTH,
                height: HEADER_HEIGHT,
                alt_text: format!("Header image for: {}", post.title),
            })
            .await?;

        self.jobs
            .complete(job_id, json!({ "image_id": image.id }), None)
            .await?;

        tracing::info!(post_id, image_id = image.id, "Generated header image");
        Ok(image)
    }

    // ── Requests from the API ───────────────────────────────────────────

    async fn create_job(
        &self,
        user: &User,
        job_type: JobType,
        blog_post_id: Option<i64>,
        cluster_id: Option<i64>,
        prompt: &str,
    ) -> Result<GenerationJob, AppError> {
        self.jobs
            .create(NewJob {
                user_id: user.id,
                job_type,
                blog_post_id,
                cluster_id,
                input_data: json!({ "prompt": prompt }),
            })
            .await
    }

    /// Accepts a cluster summary request and returns the task to run.
    pub async fn request_cluster_summary(
        &self,
        user: &User,
        cluster_id: i64,
    ) -> Result<Task, AppError> {
        self.require_cluster(cluster_id).await?;
        let job = self
            .create_job(user, JobType::ClusterSummary, None, Some(cluster_id), "")
            .await?;

        Ok(Task::SummarizeCluster {
            cluster_id,
            job_id: Some(job.id),
        })
    }

    /// Accepts a post generation request for a cluster.
    pub async fn request_post(
        &self,
        user: &User,
        cluster_id: i64,
        prompt: &str,
    ) -> Result<Task, AppError> {
        self.require_cluster(cluster_id).await?;
        let job = self
            .create_job(user, JobType::BlogPost, None, Some(cluster_id), prompt)
            .await?;

        Ok(Task::GenerateBlogPost {
            job_id: job.id,
            user_id: user.id,
            cluster_id,
            prompt: prompt.to_string(),
            post_id: None,
        })
    }

    /// Creates a `Draft: <cluster name>` post and the task that fills it in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when the cluster has fewer than two
    /// articles.
    pub async fn request_post_from_cluster(
        &self,
        user: &User,
        cluster_id: i64,
        prompt: &str,
    ) -> Result<(Task, i64), AppError> {
        let cluster = self.require_cluster(cluster_id).await?;
        if cluster.article_count < MIN_ARTICLES_FOR_POST {
            return Err(AppError::bad_request(
                "Need at least 2 articles to generate a post",
                json!({ "article_count": cluster.article_count }),
            ));
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let suffix = &suffix[..8];
        let draft = self
            .posts
            .create(NewPost {
                created_by: user.id,
                title: format!("Draft: {}", cluster.name),
                slug: slugify(&format!("{}-{suffix}", cluster.name)),
                content_markdown: String::new(),
                excerpt: String::new(),
                source_cluster_id: Some(cluster_id),
                status: PostStatus::Draft,
                meta_title: String::new(),
                meta_description: String::new(),
            })
            .await?;

        let job = self
            .create_job(user, JobType::BlogPost, Some(draft.id), Some(cluster_id), prompt)
            .await?;

        Ok((
            Task::GenerateBlogPost {
                job_id: job.id,
                user_id: user.id,
                cluster_id,
                prompt: prompt.to_string(),
                post_id: Some(draft.id),
            },
            draft.id,
        ))
    }

    /// Accepts a header image request for one of the caller's posts.
    pub async fn request_image(
        &self,
        user: &User,
        post_id: i64,
        prompt: &str,
    ) -> Result<Task, AppError> {
        self.owned_post(user, post_id).await?;
        let job = self
            .create_job(user, JobType::Image, Some(post_id), None, prompt)
            .await?;

        Ok(Task::GenerateImage {
            job_id: job.id,
            post_id,
            prompt: prompt.to_string(),
        })
    }

    // ── Posts ───────────────────────────────────────────────────────────

    pub async fn list_posts(
        &self,
        user: &User,
        filter: PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<BlogPost>, i64), AppError> {
        tokio::try_join!(
            self.posts.list(user.id, filter.clone(), offset, limit),
            self.posts.count(user.id, filter)
        )
    }

    pub async fn get_post(&self, user: &User, id: i64) -> Result<PostDetail, AppError> {
        let post = self.owned_post(user, id).await?;
        let (images, source_articles) =
            tokio::try_join!(self.posts.images(id), self.posts.source_articles(id))?;

        Ok(PostDetail {
            post,
            images,
            source_articles,
        })
    }

    pub async fn create_post(&self, user: &User, input: ManualPost) -> Result<BlogPost, AppError> {
        if let Some(cluster_id) = input.source_cluster_id {
            self.require_cluster(cluster_id).await?;
        }

        let slug = self.post_slug(&input.title).await?;
        self.posts
            .create(NewPost {
                created_by: user.id,
                title: input.title,
                slug,
                content_markdown: input.content_markdown,
                excerpt: input.excerpt,
                source_cluster_id: input.source_cluster_id,
                status: input.status.unwrap_or(PostStatus::Draft),
                meta_title: String::new(),
                meta_description: String::new(),
            })
            .await
    }

    pub async fn update_post(
        &self,
        user: &User,
        id: i64,
        patch: PostPatch,
    ) -> Result<BlogPost, AppError> {
        self.owned_post(user, id).await?;
        self.posts.update(id, patch).await
    }

    pub async fn delete_post(&self, user: &User, id: i64) -> Result<(), AppError> {
        self.owned_post(user, id).await?;
        self.posts.delete(id).await?;
        Ok(())
    }

    /// Sets status `published` and stamps `published_at`.
    pub async fn publish(&self, user: &User, id: i64) -> Result<BlogPost, AppError> {
        self.owned_post(user, id).await?;
        let post = self.posts.publish(id).await?;
        tracing::info!(post_id = id, "Published post");
        Ok(post)
    }

    // ── Jobs ────────────────────────────────────────────────────────────

    pub async fn list_jobs(
        &self,
        user: &User,
        filter: JobFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<GenerationJob>, i64), AppError> {
        tokio::try_join!(
            self.jobs.list(user.id, filter.clone(), offset, limit),
            self.jobs.count(user.id, filter)
        )
    }

    pub async fn get_job(&self, user: &User, id: i64) -> Result<GenerationJob, AppError> {
        self.jobs
            .find_by_id(id)
            .await?
            .filter(|j| user.can_access(j.user_id))
            .ok_or_else(|| AppError::not_found("Job not found", json!({ "id": id })))
    }

    /// Records the final failure of a tracked generation task.
    pub async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), AppError> {
        self.jobs.fail(job_id, message).await
    }
}
