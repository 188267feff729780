//! Interfaces to external systems.
//!
//! Providers wrap third-party APIs and return `anyhow` errors; services turn
//! those into [`crate::error::AppError::Upstream`].

pub mod ai;
pub mod fetcher;
pub mod mail;
pub mod oauth;
pub mod storage;

pub use ai::{AiProvider, TextOptions};
pub use fetcher::{FetchedPage, PageFetcher};
pub use mail::MailProvider;
pub use oauth::{OAuthProfile, OAuthProvider, OAuthTokens};
pub use storage::{MediaStore, StoredMedia};

#[cfg(test)]
pub use ai::MockAiProvider;
#[cfg(test)]
pub use fetcher::MockPageFetcher;
#[cfg(test)]
pub use mail::MockMailProvider;
#[cfg(test)]
pub use oauth::MockOAuthProvider;
#[cfg(test)]
pub use storage::MockMediaStore;
