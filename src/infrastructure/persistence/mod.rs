//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits. Fixed queries use
//! the compile-time checked `sqlx::query!` family. Filtered lists with a
//! caller-chosen `ordering` are assembled with [`sqlx::QueryBuilder`], and
//! every value is bound, never interpolated.
//!
//! # Repositories
//!
//! - [`PgUserRepository`] / [`PgSessionRepository`] - Accounts and sessions
//! - [`PgEmailRepository`] / [`PgLinkRepository`] - Newsletters and extracted links
//! - [`PgArticleRepository`] - Articles, scrape state, embeddings
//! - [`PgClusterRepository`] - Topic clusters and merges
//! - [`PgPostRepository`] / [`PgJobRepository`] - Generated posts, images, jobs

pub mod pg_article_repository;
pub mod pg_cluster_repository;
pub mod pg_email_repository;
pub mod pg_job_repository;
pub mod pg_link_repository;
pub mod pg_post_repository;
pub mod pg_session_repository;
pub mod pg_user_repository;

pub use pg_article_repository::PgArticleRepository;
pub use pg_cluster_repository::PgClusterRepository;
pub use pg_email_repository::PgEmailRepository;
pub use pg_job_repository::PgJobRepository;
pub use pg_link_repository::PgLinkRepository;
pub use pg_post_repository::PgPostRepository;
pub use pg_session_repository::PgSessionRepository;
pub use pg_user_repository::PgUserRepository;

/// `%term%` for `ILIKE`, with the pattern metacharacters escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("gpt"), "%gpt%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
