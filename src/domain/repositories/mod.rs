//! Repository trait definitions for the domain layer.
//!
//! These traits abstract data access and are implemented by the PostgreSQL
//! repositories in `crate::infrastructure::persistence`. Mock implementations
//! are generated with `mockall` for service unit tests.
//!
//! # Available Repositories
//!
//! - [`UserRepository`] - User accounts and Gmail credentials
//! - [`SessionRepository`] - Login sessions and API tokens
//! - [`EmailRepository`] / [`LinkRepository`] - Ingested newsletters and their links
//! - [`ArticleRepository`] - Articles, scrape state and embeddings
//! - [`ClusterRepository`] - Topic clusters and merges
//! - [`PostRepository`] / [`JobRepository`] - Generated content and job tracking
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod article_repository;
pub mod cluster_repository;
pub mod email_repository;
pub mod job_repository;
pub mod link_repository;
pub mod post_repository;
pub mod session_repository;
pub mod user_repository;

pub use article_repository::{ArticleFilter, ArticleRepository};
pub use cluster_repository::{ClusterFilter, ClusterRepository};
pub use email_repository::{EmailFilter, EmailRepository};
pub use job_repository::{JobFilter, JobRepository};
pub use link_repository::{LinkFilter, LinkRepository};
pub use post_repository::{PostFilter, PostRepository};
pub use session_repository::{Session, SessionRepository};
pub use user_repository::UserRepository;

#[cfg(test)]
pub use article_repository::MockArticleRepository;
#[cfg(test)]
pub use cluster_repository::MockClusterRepository;
#[cfg(test)]
pub use email_repository::MockEmailRepository;
#[cfg(test)]
pub use job_repository::MockJobRepository;
#[cfg(test)]
pub use link_repository::MockLinkRepository;
#[cfg(test)]
pub use post_repository::MockPostRepository;
#[cfg(test)]
pub use session_repository::MockSessionRepository;
#[cfg(test)]
pub use user_repository::MockUserRepository;

/// A whitelisted sort column and direction.
///
/// `field` is always one of the column names a repository accepts, so it can
/// be spliced into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: &'static str,
    pub descending: bool,
}

impl SortOrder {
    /// Parses DRF-style `field` / `-field` against a whitelist.
    ///
    /// Returns `None` for names outside `allowed`.
    pub fn parse(value: &str, allowed: &[&'static str]) -> Option<Self> {
        let (name, descending) = match value.trim().strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (value.trim(), false),
        };

        allowed
            .iter()
            .copied()
            .find(|f| *f == name)
            .map(|field| Self {
                field,
                descending,
            })
    }

    pub fn to_sql(self) -> String {
        format!(
            "{} {}",
            self.field,
            if self.descending { "DESC NULLS LAST" } else { "ASC NULLS FIRST" }
        )
    }
}
