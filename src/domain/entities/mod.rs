//! Core domain entities.
//!
//! Entities are plain data structures loaded with `sqlx::FromRow`. Creation
//! inputs use separate `New*` structs and partial updates use `*Patch` structs
//! whose `None` fields are left untouched.
//!
//! # Entity Types
//!
//! - [`User`] - A Google account using the dashboard
//! - [`NewsletterEmail`] - A message pulled from Gmail
//! - [`ExtractedLink`] - A link found inside an email
//! - [`Article`] - A scraped web page, deduplicated by canonical URL
//! - [`TopicCluster`] - A group of similar articles
//! - [`BlogPost`] / [`GeneratedImage`] - Generated content
//! - [`GenerationJob`] - Progress record for a generation request

pub mod article;
pub mod cluster;
pub mod email;
pub mod job;
pub mod link;
pub mod post;
pub mod user;

pub use article::{
    Article, ArticleDuplicate, ArticleEmbedding, NewArticle, ScoredArticle, ScrapeStatus,
    ScrapedContent,
};
pub use cluster::{ClusterMerge, ClusterPatch, NewCluster, TopicCluster};
pub use email::{MailMessage, NewEmail, NewsletterEmail};
pub use job::{GenerationJob, JobStatus, JobType, NewJob};
pub use link::{ExtractedLink, LinkStatus, NewExtractedLink};
pub use post::{
    BlogPost, GeneratedImage, GeneratedPost, ImageType, NewImage, NewPost, PostPatch, PostStatus,
};
pub use user::{NewUser, User, UserPatch};
