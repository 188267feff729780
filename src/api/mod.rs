//! JSON API served under `/api`.
//!
//! Public reads (articles, clusters, Google sign-in) and the session-protected
//! dashboard API share one set of DTOs and error responses.
//!
//! - [`dto`] - request bodies, query strings and response shapes
//! - [`handlers`] - one module per resource
//! - [`middleware`] - session auth, rate limiting and request tracing
//! - [`routes`] - public and protected routers

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
