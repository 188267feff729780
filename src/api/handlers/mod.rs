//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod articles;
pub mod auth;
pub mod clusters;
pub mod emails;
pub mod health;
pub mod posts;
pub mod users;

pub use health::health_handler;
