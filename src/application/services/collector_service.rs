//! Newsletter ingestion: Gmail sync, link extraction, email summaries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::entities::{
    ExtractedLink, LinkStatus, NewArticle, NewExtractedLink, NewsletterEmail, ScrapeStatus, User,
};
use crate::domain::providers::{AiProvider, MailProvider, OAuthProvider, TextOptions};
use crate::domain::repositories::{
    ArticleRepository, EmailFilter, EmailRepository, LinkFilter, LinkRepository, UserRepository,
};
use crate::domain::task::Task;
use crate::error::AppError;
use crate::utils::crypto::TokenCipher;
use crate::utils::html::{extract_links, html_to_text};
use crate::utils::links::{canonicalize_url, is_valid_article_url, url_hash};
use crate::utils::text::truncate;

const MAX_MESSAGES_PER_SYNC: u32 = 50;
const SUMMARY_INPUT_CHARS: usize = 8000;
const STORED_SURROUNDING_CHARS: usize = 1000;
const LINK_PAGE_SIZE: i64 = 500;

/// Counts reported by a link re-validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevalidationReport {
    pub checked: usize,
    pub changed: usize,
}

/// The Collector: pulls newsletters from Gmail and turns their links into
/// articles waiting to be scraped.
pub struct CollectorService<U, E, L, A>
where
    U: UserRepository,
    E: EmailRepository,
    L: LinkRepository,
    A: ArticleRepository,
{
    users: Arc<U>,
    emails: Arc<E>,
    links: Arc<L>,
    articles: Arc<A>,
    mail: Arc<dyn MailProvider>,
    oauth: Arc<dyn OAuthProvider>,
    ai: Arc<dyn AiProvider>,
    cipher: TokenCipher,
    newsletter_label: String,
}

impl<U, E, L, A> CollectorService<U, E, L, A>
where
    U: UserRepository,
    E: EmailRepository,
    L: LinkRepository,
    A: ArticleRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<U>,
        emails: Arc<E>,
        links: Arc<L>,
        articles: Arc<A>,
        mail: Arc<dyn MailProvider>,
        oauth: Arc<dyn OAuthProvider>,
        ai: Arc<dyn AiProvider>,
        cipher: TokenCipher,
        newsletter_label: String,
    ) -> Self {
        Self {
            users,
            emails,
            links,
            articles,
            mail,
            oauth,
            ai,
            cipher,
            newsletter_label,
        }
    }

    /// Fresh Gmail access token for a connected user.
    ///
    /// Returns `Ok(None)` when the user has no usable refresh token (never
    /// connected, or the stored ciphertext does not decrypt).
    async fn access_token(&self, user: &User) -> Result<Option<String>, AppError> {
        let Some(encrypted) = user.gmail_refresh_token.as_deref() else {
            return Ok(None);
        };

        let refresh_token = match self.cipher.decrypt(encrypted) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(user_id = user.id, error = %e, "Stored Gmail token is unreadable");
                return Ok(None);
            }
        };

        let access_token = self
            .oauth
            .refresh_access_token(&refresh_token)
            .await
            .map_err(|e| AppError::from_provider("Failed to refresh Gmail access", &e))?;

        Ok(Some(access_token))
    }

    fn search_query(&self, since: Option<DateTime<Utc>>) -> String {
        let mut query = format!("label:{}", self.newsletter_label);
        if let Some(since) = since {
            query.push_str(&format!(" after:{}", since.format("%Y/%m/%d")));
        }
        query
    }

    /// Stores the user's new newsletter messages.
    ///
    /// Messages already stored are skipped, and a message that fails to
    /// download is logged and skipped. Returns one `ProcessEmail` follow-up
    /// per stored email.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown users and
    /// [`AppError::Upstream`] when Gmail cannot be listed.
    pub async fn sync_user(
        &self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Task>, AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found", json!({ "user_id": user_id })))?;

        if !user.gmail_connected {
            tracing::warn!(user_id, "Gmail not connected, skipping sync");
            return Ok(vec![]);
        }

        let Some(access_token) = self.access_token(&user).await? else {
            tracing::warn!(user_id, "No usable Gmail credentials, skipping sync");
            return Ok(vec![]);
        };

        let message_ids = self
            .mail
            .list_message_ids(
                &access_token,
                &self.search_query(since),
                MAX_MESSAGES_PER_SYNC,
            )
            .await
            .map_err(|e| AppError::from_provider("Failed to list Gmail messages", &e))?;

        let known = self
            .emails
            .existing_message_ids(user.id, message_ids.clone())
            .await?;

        let mut follow_ups = Vec::new();
        for message_id in message_ids.iter().filter(|id| !known.contains(id)) {
            let message = match self.mail.get_message(&access_token, message_id).await {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(user_id, message_id = %message_id, error = %format!("{e:#}"), "Failed to fetch message");
                    continue;
                }
            };

            if let Some(email) = self.emails.create(message.into_new_email(user.id)).await? {
                tracing::debug!(email_id = email.id, subject = %email.subject, "Stored newsletter");
                follow_ups.push(Task::ProcessEmail { email_id: email.id });
            }
        }

        tracing::info!(
            user_id,
            listed = message_ids.len(),
            stored = follow_ups.len(),
            "Gmail sync finished"
        );
        Ok(follow_ups)
    }

    /// One `FetchEmails` task per active user with Gmail connected.
    pub async fn sync_all_users(&self) -> Result<Vec<Task>, AppError> {
        let users = self.users.list_gmail_connected().await?;
        tracing::info!(users = users.len(), "Queueing email fetch for connected users");

        Ok(users
            .into_iter()
            .map(|u| Task::FetchEmails {
                user_id: u.id,
                since: None,
            })
            .collect())
    }

    /// Extracts links from an email and registers their articles.
    ///
    /// No-op for emails already processed. Returns `ScrapeArticle` follow-ups
    /// for articles still waiting to be scraped.
    pub async fn process_email(&self, email_id: i64) -> Result<Vec<Task>, AppError> {
        let email = self
            .emails
            .find_by_id(email_id)
            .await?
            .ok_or_else(|| AppError::not_found("Email not found", json!({ "email_id": email_id })))?;

        if email.is_processed {
            return Ok(vec![]);
        }

        let mut new_links = Vec::new();
        for anchor in extract_links(&email.raw_html) {
            let Ok(canonical_url) = canonicalize_url(&anchor.href) else {
                tracing::debug!(href = %anchor.href, "Skipping unparseable link");
                continue;
            };

            let new_link = NewExtractedLink {
                email_id: email.id,
                is_valid_article: is_valid_article_url(&canonical_url),
                raw_url: anchor.href,
                canonical_url,
                anchor_text: anchor.anchor_text,
                surrounding_text: truncate(&anchor.surrounding_text, STORED_SURROUNDING_CHARS)
                    .to_string(),
            };

            if let Some(link) = self.links.create(new_link).await? {
                new_links.push(link);
            }
        }

        let link_count = self.links.list_for_email(email.id).await?.len();
        self.emails
            .set_link_count(email.id, link_count as i32)
            .await?;

        let mut follow_ups = Vec::new();
        for link in &new_links {
            let (article_id, status) = self.register_article(link).await?;
            if status == ScrapeStatus::Pending {
                follow_ups.push(Task::ScrapeArticle { article_id });
            }
        }

        self.emails.mark_processed(email.id).await?;

        tracing::info!(
            email_id,
            new_links = new_links.len(),
            to_scrape = follow_ups.len(),
            "Processed email"
        );
        Ok(follow_ups)
    }

    /// Links a new link to an existing article (status `duplicate`) or to a
    /// freshly created pending one (status `valid`).
    async fn register_article(&self, link: &ExtractedLink) -> Result<(i64, ScrapeStatus), AppError> {
        let hash = url_hash(&link.canonical_url);

        if let Some(existing) = self.articles.find_by_hash(&hash).await? {
            self.links
                .set_status(link.id, LinkStatus::Duplicate, Some(existing.id))
                .await?;
            return Ok((existing.id, existing.scrape_status));
        }

        let article = match self
            .articles
            .create(NewArticle {
                canonical_url: link.canonical_url.clone(),
                url_hash: hash.clone(),
            })
            .await
        {
            Ok(article) => article,
            // Another email registered the same URL concurrently.
            Err(AppError::Conflict { .. }) => {
                let existing = self.articles.find_by_hash(&hash).await?.ok_or_else(|| {
                    AppError::internal("Article vanished after conflict", json!({ "hash": hash }))
                })?;
                self.links
                    .set_status(link.id, LinkStatus::Duplicate, Some(existing.id))
                    .await?;
                return Ok((existing.id, existing.scrape_status));
            }
            Err(e) => return Err(e),
        };

        self.links
            .set_status(link.id, LinkStatus::Valid, Some(article.id))
            .await?;
        Ok((article.id, article.scrape_status))
    }

    /// Generates and stores a headline plus bullet-point summary of an email.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the email is missing or not the viewer's
    /// - [`AppError::Validation`] if the email has no HTML body
    /// - [`AppError::Internal`] if the model returns nothing
    pub async fn summarize_email(&self, viewer: &User, email_id: i64) -> Result<String, AppError> {
        let email = self.get_owned_email(viewer, email_id).await?;

        if email.raw_html.trim().is_empty() {
            return Err(AppError::bad_request(
                "No content to summarize",
                json!({ "email_id": email_id }),
            ));
        }

        let text = html_to_text(&email.raw_html);
        let prompt = format!(
            "Create a concise summary of this newsletter.\n\n\
             Format:\n\
             **Headline** (5-10 words capturing the main theme)\n\n\
             • Bullet 1 (key point, max 15 words)\n\
             • Bullet 2\n\
             • Bullet 3 (3-5 bullets total)\n\n\
             Rules:\n\
             - No preamble (\"Here is a summary\", \"This newsletter covers\")\n\
             - No filler phrases (\"The newsletter provides\", \"Readers will learn\")\n\
             - Start bullets with action verbs or key nouns\n\
             - Facts only, no commentary\n\n\
             Email:\n{}",
            truncate(&text, SUMMARY_INPUT_CHARS)
        );

        let summary = self
            .ai
            .generate_text(&prompt, TextOptions::default())
            .await
            .map_err(|e| AppError::from_provider("Summary generation failed", &e))?;

        let summary = summary.trim();
        if summary.is_empty() {
            return Err(AppError::internal(
                "Failed to generate summary",
                json!({ "email_id": email_id }),
            ));
        }

        self.emails.set_summary(email.id, summary).await?;
        tracing::info!(email_id, "Generated email summary");
        Ok(summary.to_string())
    }

    /// Re-runs the article heuristic over every stored link.
    ///
    /// With `dry_run` nothing is written.
    pub async fn revalidate_links(&self, dry_run: bool) -> Result<RevalidationReport, AppError> {
        let mut report = RevalidationReport::default();
        let mut after_id = 0;

        loop {
            let page = self.links.list_all(after_id, LINK_PAGE_SIZE).await?;
            let Some(last) = page.last() else {
                break;
            };
            after_id = last.id;

            for link in &page {
                report.checked += 1;
                let valid = is_valid_article_url(&link.canonical_url);
                if valid != link.is_valid_article {
                    report.changed += 1;
                    if !dry_run {
                        self.links.set_valid_article(link.id, valid).await?;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn get_owned_email(&self, viewer: &User, id: i64) -> Result<NewsletterEmail, AppError> {
        self.emails
            .find_by_id(id)
            .await?
            .filter(|e| viewer.can_access(e.user_id))
            .ok_or_else(|| AppError::not_found("Email not found", json!({ "id": id })))
    }

    pub async fn list_emails(
        &self,
        viewer: &User,
        filter: EmailFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<NewsletterEmail>, i64), AppError> {
        tokio::try_join!(
            self.emails.list(viewer.id, filter.clone(), offset, limit),
            self.emails.count(viewer.id, filter)
        )
    }

    /// An email with its extracted links.
    pub async fn get_email(
        &self,
        viewer: &User,
        id: i64,
    ) -> Result<(NewsletterEmail, Vec<ExtractedLink>), AppError> {
        let email = self.get_owned_email(viewer, id).await?;
        let links = self.links.list_for_email(email.id).await?;
        Ok((email, links))
    }

    pub async fn list_links(
        &self,
        viewer: &User,
        filter: LinkFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ExtractedLink>, i64), AppError> {
        tokio::try_join!(
            self.links.list(viewer.id, filter.clone(), offset, limit),
            self.links.count(viewer.id, filter)
        )
    }

    pub async fn get_link(&self, viewer: &User, id: i64) -> Result<ExtractedLink, AppError> {
        self.links
            .find_with_owner(id)
            .await?
            .filter(|(_, owner)| viewer.can_access(*owner))
            .map(|(link, _)| link)
            .ok_or_else(|| AppError::not_found("Link not found", json!({ "id": id })))
    }
}
