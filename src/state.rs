//! Shared application state injected into every handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::application::pipeline::Pipeline;
use crate::application::services::{
    AnalystService, AuthService, ClusterService, CollectorService, CreatorService, UserService,
};
use crate::application::worker::TaskQueue;
use crate::config::Config;
use crate::domain::providers::{AiProvider, MailProvider, MediaStore, OAuthProvider, PageFetcher};
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::persistence::{
    PgArticleRepository, PgClusterRepository, PgEmailRepository, PgJobRepository,
    PgLinkRepository, PgPostRepository, PgSessionRepository, PgUserRepository,
};
use crate::utils::crypto::TokenCipher;

pub type Auth = AuthService<PgUserRepository, PgSessionRepository>;
pub type Users = UserService<PgUserRepository>;
pub type Collector =
    CollectorService<PgUserRepository, PgEmailRepository, PgLinkRepository, PgArticleRepository>;
pub type Analyst = AnalystService<PgArticleRepository, PgLinkRepository>;
pub type Clusters = ClusterService<PgArticleRepository, PgClusterRepository>;
pub type Creator =
    CreatorService<PgArticleRepository, PgClusterRepository, PgPostRepository, PgJobRepository>;
pub type PgPipeline = Pipeline<
    PgUserRepository,
    PgEmailRepository,
    PgLinkRepository,
    PgArticleRepository,
    PgClusterRepository,
    PgPostRepository,
    PgJobRepository,
>;

/// Outbound integrations, built once at startup (or stubbed in tests).
#[derive(Clone)]
pub struct Providers {
    pub ai: Arc<dyn AiProvider>,
    pub mail: Arc<dyn MailProvider>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub media: Arc<dyn MediaStore>,
}

/// Settings handlers need for redirects and cookies.
#[derive(Debug, Clone)]
pub struct WebSettings {
    pub frontend_url: String,
    pub cookie_secure: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PgPool>,
    pub auth_service: Arc<Auth>,
    pub user_service: Arc<Users>,
    pub collector_service: Arc<Collector>,
    pub analyst_service: Arc<Analyst>,
    pub cluster_service: Arc<Clusters>,
    pub creator_service: Arc<Creator>,
    pub cache: Arc<dyn CacheService>,
    pub task_queue: TaskQueue,
    pub web: WebSettings,
}

impl AppState {
    /// Wires repositories, services and providers over one pool.
    pub fn new(
        pool: Arc<PgPool>,
        config: &Config,
        providers: Providers,
        cache: Arc<dyn CacheService>,
        task_queue: TaskQueue,
    ) -> Self {
        let users = Arc::new(PgUserRepository::new(pool.clone()));
        let sessions = Arc::new(PgSessionRepository::new(pool.clone()));
        let emails = Arc::new(PgEmailRepository::new(pool.clone()));
        let links = Arc::new(PgLinkRepository::new(pool.clone()));
        let articles = Arc::new(PgArticleRepository::new(pool.clone()));
        let clusters = Arc::new(PgClusterRepository::new(pool.clone()));
        let posts = Arc::new(PgPostRepository::new(pool.clone()));
        let jobs = Arc::new(PgJobRepository::new(pool.clone()));

        let cipher = TokenCipher::new(&config.encryption_key);

        let auth_service = Arc::new(AuthService::new(
            users.clone(),
            sessions,
            providers.oauth.clone(),
            config.token_signing_secret.clone(),
            cipher.clone(),
            &config.public_base_url,
        ));
        let user_service = Arc::new(UserService::new(users.clone()));
        let collector_service = Arc::new(CollectorService::new(
            users,
            emails,
            links.clone(),
            articles.clone(),
            providers.mail,
            providers.oauth,
            providers.ai.clone(),
            cipher,
            config.gmail_newsletter_label.clone(),
        ));
        let analyst_service = Arc::new(AnalystService::new(
            articles.clone(),
            links,
            providers.fetcher,
            providers.ai.clone(),
            cache.clone(),
        ));
        let cluster_service = Arc::new(ClusterService::new(
            articles.clone(),
            clusters.clone(),
            cache.clone(),
            config.duplicate_threshold,
            config.cluster_threshold,
        ));
        let creator_service = Arc::new(CreatorService::new(
            articles,
            clusters,
            posts,
            jobs,
            providers.ai,
            providers.media,
        ));

        Self {
            pool,
            auth_service,
            user_service,
            collector_service,
            analyst_service,
            cluster_service,
            creator_service,
            cache,
            task_queue,
            web: WebSettings {
                frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
                cookie_secure: config.cookie_secure,
            },
        }
    }

    /// The task handler sharing this state's services.
    pub fn pipeline(&self) -> PgPipeline {
        Pipeline::new(
            self.collector_service.clone(),
            self.analyst_service.clone(),
            self.cluster_service.clone(),
            self.creator_service.clone(),
        )
    }
}
