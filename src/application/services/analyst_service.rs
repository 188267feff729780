//! Article scraping, embeddings and per-article summaries.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use crate::application::services::cluster_service::similar_cache_key;
use crate::domain::entities::{Article, ExtractedLink, ScrapedContent};
use crate::domain::providers::{AiProvider, PageFetcher, TextOptions};
use crate::domain::repositories::{ArticleFilter, ArticleRepository, LinkRepository};
use crate::domain::task::Task;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::html::extract_article;
use crate::utils::links::extract_real_url;
use crate::utils::text::truncate;

/// Articles are not scraped again once they reach this many attempts.
pub const MAX_SCRAPE_ATTEMPTS: i32 = 3;

const SCRAPE_BATCH: i64 = 20;
const RETRY_BATCH: i64 = 10;
const EMBED_BATCH: i64 = 20;
const RETRY_AFTER_HOURS: i64 = 1;

const EMBEDDING_INPUT_CHARS: usize = 12_000;
const MIN_EMBEDDING_CHARS: usize = 10;
const SUMMARY_INPUT_CHARS: usize = 6000;

/// The Analyst: turns registered URLs into scraped, embedded and
/// summarised articles.
pub struct AnalystService<A: ArticleRepository, L: LinkRepository> {
    articles: Arc<A>,
    links: Arc<L>,
    fetcher: Arc<dyn PageFetcher>,
    ai: Arc<dyn AiProvider>,
    cache: Arc<dyn CacheService>,
}

/// Column limits of the article table.
fn clamp_scraped(mut content: ScrapedContent) -> ScrapedContent {
    content.title = truncate(&content.title, 500).to_string();
    content.author = truncate(&content.author, 255).to_string();
    content.publication = truncate(&content.publication, 255).to_string();
    content.og_image = truncate(&content.og_image, 2000).to_string();
    content
}

impl<A: ArticleRepository, L: LinkRepository> AnalystService<A, L> {
    pub fn new(
        articles: Arc<A>,
        links: Arc<L>,
        fetcher: Arc<dyn PageFetcher>,
        ai: Arc<dyn AiProvider>,
        cache: Arc<dyn CacheService>,
    ) -> Self {
        Self {
            articles,
            links,
            fetcher,
            ai,
            cache,
        }
    }

    async fn require(&self, id: i64) -> Result<Article, AppError> {
        self.articles
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Article not found", json!({ "id": id })))
    }

    /// Downloads and extracts one article.
    ///
    /// Fetch and extraction failures are recorded on the article (status
    /// `failed`) rather than returned; the periodic retry picks them up.
    /// On success returns `GenerateEmbedding` and `SummarizeArticle`.
    pub async fn scrape_article(&self, article_id: i64) -> Result<Vec<Task>, AppError> {
        self.require(article_id).await?;
        let article = self.articles.mark_scrape_started(article_id).await?;

        let url = extract_real_url(&article.canonical_url);
        tracing::info!(article_id, url = %url, attempt = article.scrape_attempts, "Scraping article");

        let page = match self.fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::warn!(article_id, error = %reason, "Fetch failed");
                self.articles.mark_scrape_failed(article_id, &reason).await?;
                return Ok(vec![]);
            }
        };

        if page.status >= 400 {
            tracing::warn!(article_id, status = page.status, "Page returned an error status");
            self.articles
                .mark_scrape_failed(article_id, &format!("Failed to scrape content (HTTP {})", page.status))
                .await?;
            return Ok(vec![]);
        }

        let content = match extract_article(&page.body) {
            Ok(content) => clamp_scraped(content),
            Err(e) => {
                tracing::warn!(article_id, error = %e, "Extraction failed");
                self.articles
                    .mark_scrape_failed(article_id, &e.to_string())
                    .await?;
                return Ok(vec![]);
            }
        };

        tracing::info!(
            article_id,
            title = %content.title,
            words = content.word_count,
            "Scraped article"
        );
        self.articles.save_scraped(article_id, content).await?;

        Ok(vec![
            Task::GenerateEmbedding { article_id },
            Task::SummarizeArticle { article_id },
        ])
    }

    /// Embeds title and body, then hands the article to clustering.
    ///
    /// Articles without content, or with too little text, are skipped.
    pub async fn generate_embedding(&self, article_id: i64) -> Result<Vec<Task>, AppError> {
        let article = self.require(article_id).await?;

        if article.content_text.is_empty() {
            tracing::warn!(article_id, "No content to embed");
            return Ok(vec![]);
        }

        let text = article.embedding_text();
        let text = truncate(&text, EMBEDDING_INPUT_CHARS);
        if text.chars().filter(|c| !c.is_whitespace()).count() < MIN_EMBEDDING_CHARS {
            tracing::warn!(article_id, "Text too short to embed");
            return Ok(vec![]);
        }

        let embedding = self
            .ai
            .embed(text)
            .await
            .map_err(|e| AppError::from_provider("Embedding generation failed", &e))?;

        if embedding.is_empty() {
            tracing::warn!(article_id, "Model returned an empty embedding");
            return Ok(vec![]);
        }

        self.articles
            .set_embedding(article_id, embedding, &self.ai.embedding_model())
            .await?;

        if let Err(e) = self.cache.invalidate(&similar_cache_key(article_id)).await {
            tracing::warn!(article_id, error = %e, "Failed to invalidate similar-article cache");
        }

        tracing::info!(article_id, "Stored embedding");
        Ok(vec![Task::ClusterArticle { article_id }])
    }

    /// Writes a two or three sentence summary. Returns `None` when there is
    /// nothing to summarise or the model stays silent.
    pub async fn summarize_article(&self, article_id: i64) -> Result<Option<String>, AppError> {
        let article = self.require(article_id).await?;

        if article.content_text.is_empty() {
            tracing::warn!(article_id, "No content to summarize");
            return Ok(None);
        }

        let prompt = format!(
            "Summarize this article in 2-3 sentences.\n\
             Focus on the key takeaway and why it matters.\n\
             Be concise and factual.\n\n\
             Title: {}\n\
             Content:\n{}",
            article.title,
            truncate(&article.content_text, SUMMARY_INPUT_CHARS)
        );

        let summary = self
            .ai
            .generate_text(&prompt, TextOptions::default())
            .await
            .map_err(|e| AppError::from_provider("Summary generation failed", &e))?;

        let summary = summary.trim();
        if summary.is_empty() {
            tracing::warn!(article_id, "Model returned no summary");
            return Ok(None);
        }

        self.articles.set_summary(article_id, summary).await?;
        tracing::info!(article_id, "Stored article summary");
        Ok(Some(summary.to_string()))
    }

    /// `ScrapeArticle` for the oldest pending articles.
    pub async fn scrape_pending(&self) -> Result<Vec<Task>, AppError> {
        let articles = self
            .articles
            .list_pending(MAX_SCRAPE_ATTEMPTS, SCRAPE_BATCH)
            .await?;
        tracing::info!(count = articles.len(), "Queueing pending articles for scraping");
        Ok(scrape_tasks(&articles))
    }

    /// `ScrapeArticle` for failed articles whose last attempt is over an hour old.
    pub async fn retry_failed(&self) -> Result<Vec<Task>, AppError> {
        let cutoff = Utc::now() - Duration::hours(RETRY_AFTER_HOURS);
        let articles = self
            .articles
            .list_retryable(MAX_SCRAPE_ATTEMPTS, cutoff, RETRY_BATCH)
            .await?;
        if !articles.is_empty() {
            tracing::info!(count = articles.len(), "Queueing failed articles for retry");
        }
        Ok(scrape_tasks(&articles))
    }

    /// `GenerateEmbedding` for scraped articles still missing a vector.
    pub async fn embed_missing(&self) -> Result<Vec<Task>, AppError> {
        let articles = self.articles.list_missing_embeddings(EMBED_BATCH).await?;
        if !articles.is_empty() {
            tracing::info!(count = articles.len(), "Queueing articles for embedding");
        }
        Ok(articles
            .iter()
            .map(|a| Task::GenerateEmbedding { article_id: a.id })
            .collect())
    }

    /// Total pending count plus the next scrape batch. A zero count means
    /// there is nothing to do.
    pub async fn process_pending(&self) -> Result<(i64, Vec<Task>), AppError> {
        let pending = self.articles.count_pending(MAX_SCRAPE_ATTEMPTS).await?;
        if pending == 0 {
            return Ok((0, vec![]));
        }
        Ok((pending, self.scrape_pending().await?))
    }

    /// Validates the article exists and returns the task re-scraping it.
    pub async fn rescrape(&self, article_id: i64) -> Result<Task, AppError> {
        self.require(article_id).await?;
        Ok(Task::ScrapeArticle { article_id })
    }

    /// Validates the article exists and returns the task summarising it.
    pub async fn request_summary(&self, article_id: i64) -> Result<Task, AppError> {
        self.require(article_id).await?;
        Ok(Task::SummarizeArticle { article_id })
    }

    pub async fn list(
        &self,
        filter: ArticleFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Article>, i64), AppError> {
        tokio::try_join!(
            self.articles.list(filter.clone(), offset, limit),
            self.articles.count(filter)
        )
    }

    /// An article with the newsletter links that pointed at it.
    pub async fn get(&self, id: i64) -> Result<(Article, Vec<ExtractedLink>), AppError> {
        let article = self.require(id).await?;
        let links = self.links.list_for_article(id).await?;
        Ok((article, links))
    }
}

fn scrape_tasks(articles: &[Article]) -> Vec<Task> {
    articles
        .iter()
        .map(|a| Task::ScrapeArticle { article_id: a.id })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ScrapeStatus;
    use crate::domain::entities::article::test_article;
    use crate::domain::providers::{FetchedPage, MockAiProvider, MockPageFetcher};
    use crate::domain::repositories::{MockArticleRepository, MockLinkRepository};
    use crate::infrastructure::cache::MockCacheService;

    struct Mocks {
        articles: MockArticleRepository,
        links: MockLinkRepository,
        fetcher: MockPageFetcher,
        ai: MockAiProvider,
        cache: MockCacheService,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                articles: MockArticleRepository::new(),
                links: MockLinkRepository::new(),
                fetcher: MockPageFetcher::new(),
                ai: MockAiProvider::new(),
                cache: MockCacheService::new(),
            }
        }

        fn build(self) -> AnalystService<MockArticleRepository, MockLinkRepository> {
            AnalystService::new(
                Arc::new(self.articles),
                Arc::new(self.links),
                Arc::new(self.fetcher),
                Arc::new(self.ai),
                Arc::new(self.cache),
            )
        }

        fn with_article(mut self, canonical_url: &'static str) -> Self {
            self.articles.expect_find_by_id().returning(move |id| {
                let mut article = test_article(id);
                article.canonical_url = canonical_url.to_string();
                article.scrape_status = ScrapeStatus::Pending;
                Ok(Some(article))
            });
            self.articles
                .expect_mark_scrape_started()
                .times(1)
                .returning(move |id| {
                    let mut article = test_article(id);
                    article.canonical_url = canonical_url.to_string();
                    article.scrape_status = ScrapeStatus::InProgress;
                    Ok(article)
                });
            self
        }
    }

    fn page(status: u16, body: &str) -> FetchedPage {
        FetchedPage {
            final_url: "https://example.com/a".to_string(),
            status,
            body: body.to_string(),
        }
    }

    fn article_html() -> String {
        format!(
            "<html><head><title>Big Story | Example</title></head><body><article><p>{}</p></article></body></html>",
            "A long paragraph about models. ".repeat(20)
        )
    }

    #[tokio::test]
    async fn test_scrape_success_queues_enrichment() {
        let mut m = Mocks::new().with_article("https://example.com/posts/big-story");
        m.fetcher
            .expect_fetch()
            .withf(|url| url == "https://example.com/posts/big-story")
            .returning(|_| Ok(page(200, &article_html())));
        m.articles
            .expect_save_scraped()
            .withf(|id, content| *id == 4 && content.title == "Big Story" && content.word_count > 50)
            .times(1)
            .returning(|_, _| Ok(()));
        m.articles.expect_mark_scrape_failed().times(0);

        let tasks = m.build().scrape_article(4).await.unwrap();
        assert_eq!(
            tasks,
            vec![
                Task::GenerateEmbedding { article_id: 4 },
                Task::SummarizeArticle { article_id: 4 }
            ]
        );
    }

    #[tokio::test]
    async fn test_scrape_unwraps_tracking_url() {
        let mut m = Mocks::new().with_article(
            "https://links.example.net/CL0/https:%2F%2Fnews.example.com%2Fstory/1/abc",
        );
        m.fetcher
            .expect_fetch()
            .withf(|url| url == "https://news.example.com/story")
            .times(1)
            .returning(|_| Ok(page(200, &article_html())));
        m.articles.expect_save_scraped().returning(|_, _| Ok(()));

        m.build().scrape_article(4).await.unwrap();
    }

    #[tokio::test]
    async fn test_scrape_error_status_marks_failed() {
        let mut m = Mocks::new().with_article("https://example.com/posts/gone");
        m.fetcher
            .expect_fetch()
            .returning(|_| Ok(page(404, "not found")));
        m.articles
            .expect_mark_scrape_failed()
            .withf(|id, reason| *id == 4 && reason.contains("404"))
            .times(1)
            .returning(|_, _| Ok(()));
        m.articles.expect_save_scraped().times(0);

        assert!(m.build().scrape_article(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scrape_short_content_marks_failed() {
        let mut m = Mocks::new().with_article("https://example.com/posts/stub");
        m.fetcher
            .expect_fetch()
            .returning(|_| Ok(page(200, "<body><p>Too short</p></body>")));
        m.articles
            .expect_mark_scrape_failed()
            .withf(|_, reason| reason.starts_with("Content too short"))
            .times(1)
            .returning(|_, _| Ok(()));

        assert!(m.build().scrape_article(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scrape_transport_error_marks_failed() {
        let mut m = Mocks::new().with_article("https://example.com/posts/timeout");
        m.fetcher
            .expect_fetch()
            .returning(|_| Err(anyhow::anyhow!("operation timed out")));
        m.articles
            .expect_mark_scrape_failed()
            .times(1)
            .returning(|_, _| Ok(()));

        assert!(m.build().scrape_article(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scrape_unknown_article() {
        let mut m = Mocks::new();
        m.articles.expect_find_by_id().returning(|_| Ok(None));
        m.articles.expect_mark_scrape_started().times(0);

        let err = m.build().scrape_article(4).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_embedding_stored_and_cache_invalidated() {
        let mut m = Mocks::new();
        m.articles
            .expect_find_by_id()
            .returning(|id| Ok(Some(test_article(id))));
        m.ai.expect_embed()
            .withf(|text| text.starts_with("Story 8\n\n"))
            .returning(|_| Ok(vec![0.1, 0.2, 0.3]));
        m.ai.expect_embedding_model()
            .returning(|| "text-embedding-004".to_string());
        m.articles
            .expect_set_embedding()
            .withf(|id, v, model| *id == 8 && v.len() == 3 && model == "text-embedding-004")
            .times(1)
            .returning(|_, _, _| Ok(()));
        m.cache
            .expect_invalidate()
            .withf(|key| key == "similar:8")
            .times(1)
            .returning(|_| Ok(()));

        let tasks = m.build().generate_embedding(8).await.unwrap();
        assert_eq!(tasks, vec![Task::ClusterArticle { article_id: 8 }]);
    }

    #[tokio::test]
    async fn test_embedding_skips_tiny_text() {
        let mut m = Mocks::new();
        m.articles.expect_find_by_id().returning(|id| {
            let mut article = test_article(id);
            article.title = String::new();
            article.content_text = "a b c".to_string();
            Ok(Some(article))
        });
        m.ai.expect_embed().times(0);

        assert!(m.build().generate_embedding(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_provider_error_is_transient() {
        let mut m = Mocks::new();
        m.articles
            .expect_find_by_id()
            .returning(|id| Ok(Some(test_article(id))));
        m.ai.expect_embed()
            .returning(|_| Err(anyhow::anyhow!("503 from upstream")));

        let err = m.build().generate_embedding(8).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_summarize_article_stores_summary() {
        let mut m = Mocks::new();
        m.articles
            .expect_find_by_id()
            .returning(|id| Ok(Some(test_article(id))));
        m.ai.expect_generate_text()
            .withf(|prompt, _| prompt.contains("Title: Story 2") && prompt.contains("2-3 sentences"))
            .returning(|_, _| Ok(" It matters. ".to_string()));
        m.articles
            .expect_set_summary()
            .withf(|id, s| *id == 2 && s == "It matters.")
            .times(1)
            .returning(|_, _| Ok(()));

        let summary = m.build().summarize_article(2).await.unwrap();
        assert_eq!(summary.as_deref(), Some("It matters."));
    }

    #[tokio::test]
    async fn test_summarize_article_without_content() {
        let mut m = Mocks::new();
        m.articles.expect_find_by_id().returning(|id| {
            let mut article = test_article(id);
            article.content_text.clear();
            Ok(Some(article))
        });
        m.ai.expect_generate_text().times(0);

        assert!(m.build().summarize_article(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_pending_with_nothing_pending() {
        let mut m = Mocks::new();
        m.articles.expect_count_pending().returning(|_| Ok(0));
        m.articles.expect_list_pending().times(0);

        let (count, tasks) = m.build().process_pending().await.unwrap();
        assert_eq!(count, 0);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_process_pending_queues_batch() {
        let mut m = Mocks::new();
        m.articles.expect_count_pending().returning(|_| Ok(42));
        m.articles
            .expect_list_pending()
            .withf(|attempts, limit| *attempts == 3 && *limit == 20)
            .returning(|_, _| Ok(vec![test_article(1), test_article(2)]));

        let (count, tasks) = m.build().process_pending().await.unwrap();
        assert_eq!(count, 42);
        assert_eq!(tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_retry_failed_uses_one_hour_cutoff() {
        let mut m = Mocks::new();
        m.articles
            .expect_list_retryable()
            .withf(|attempts, before, limit| {
                let age = Utc::now() - *before;
                *attempts == 3 && *limit == 10 && age >= Duration::minutes(59)
            })
            .returning(|_, _, _| Ok(vec![test_article(5)]));

        let tasks = m.build().retry_failed().await.unwrap();
        assert_eq!(tasks, vec![Task::ScrapeArticle { article_id: 5 }]);
    }

    #[test]
    fn test_clamp_scraped_limits_columns() {
        let content = clamp_scraped(ScrapedContent {
            title: "t".repeat(600),
            author: "a".repeat(300),
            ..Default::default()
        });
        assert_eq!(content.title.len(), 500);
        assert_eq!(content.author.len(), 255);
    }
}
