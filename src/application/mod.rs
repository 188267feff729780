//! Application layer: business rules and background processing.
//!
//! Services consume repository and provider traits and expose the operations
//! used by HTTP handlers, the admin CLI and the task pipeline.
//!
//! # Modules
//!
//! - [`services`] - Collector, Analyst, clustering, Creator, auth and users
//! - [`worker`] - bounded task queue and retrying worker
//! - [`pipeline`] - maps tasks and periodic jobs onto services
//! - [`scheduler`] - periodic batch jobs

pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod worker;
