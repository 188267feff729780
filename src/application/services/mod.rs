//! Business logic services for the application layer.

use std::future::Future;

use crate::error::AppError;

pub mod analyst_service;
pub mod auth_service;
pub mod cluster_service;
pub mod collector_service;
pub mod creator_service;
pub mod user_service;

pub use analyst_service::AnalystService;
pub use auth_service::AuthService;
pub use cluster_service::ClusterService;
pub use collector_service::CollectorService;
pub use creator_service::CreatorService;
pub use user_service::UserService;

/// First free slug among `base`, `base-1`, `base-2`, ...
pub(crate) async fn unique_slug<F, Fut>(base: &str, mut exists: F) -> Result<String, AppError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, AppError>>,
{
    let mut slug = base.to_string();
    let mut counter = 1;
    while exists(slug.clone()).await? {
        slug = format!("{base}-{counter}");
        counter += 1;
    }
    Ok(slug)
}
