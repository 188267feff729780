//! Data Transfer Objects for API requests and responses.
//!
//! All DTOs use Serde for JSON serialization/deserialization and validator
//! for input validation. Entities are mapped into response types so internal
//! columns (embeddings, encrypted tokens) never reach the wire.

pub mod articles;
pub mod clusters;
pub mod emails;
pub mod health;
pub mod pagination;
pub mod posts;
pub mod tasks;
pub mod users;
