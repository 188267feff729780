//! Web page fetching.

use async_trait::async_trait;

/// A fetched HTML document.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// Downloads article pages.
///
/// # Implementations
///
/// - [`crate::infrastructure::http_fetcher::HttpFetcher`] - reqwest-based fetcher
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a page. Non-success statuses are returned, not raised; only
    /// transport failures are errors.
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage>;
}
