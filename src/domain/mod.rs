//! Domain layer: entities, repository and provider interfaces, task model.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`providers`] - External system interfaces (AI, mail, OAuth, web, storage)
//! - [`task`] - Background task model and retry policies
//!
//! The domain layer has no dependencies on infrastructure or presentation
//! layers. Business logic lives in [`crate::application::services`].
//!
//! # Pipeline
//!
//! 1. `FetchEmails` stores new newsletter messages
//! 2. `ProcessEmail` extracts links and registers articles
//! 3. `ScrapeArticle` downloads and extracts content
//! 4. `GenerateEmbedding` + `SummarizeArticle` enrich the article
//! 5. `ClusterArticle` deduplicates and assigns a topic cluster

pub mod entities;
pub mod providers;
pub mod repositories;
pub mod task;
