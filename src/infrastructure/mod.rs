//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for data persistence, caching and outbound APIs.
//!
//! # Modules
//!
//! - [`cache`] - Caching abstractions (Redis and no-op implementations)
//! - [`persistence`] - PostgreSQL repository implementations
//! - [`google`] - Gemini, Gmail and OAuth 2.0 clients
//! - [`http_fetcher`] - Article page downloads
//! - [`media`] - Generated image storage

pub mod cache;
pub mod google;
pub mod http_fetcher;
pub mod media;
pub mod persistence;
