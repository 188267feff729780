//! Helpers shared across the pipeline.
//!
//! - [`links`] - URL canonicalisation, tracking-link unwrapping, article heuristics
//! - [`html`] - Link and article extraction from HTML
//! - [`crypto`] - Session token hashing, OAuth state signing, secret encryption
//! - [`vector`] - Embedding similarity and centroids
//! - [`text`] - Truncation and slugs

pub mod crypto;
pub mod html;
pub mod links;
pub mod text;
pub mod vector;
