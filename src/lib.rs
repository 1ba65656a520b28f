//! Enrollment, progress, quiz-scoring and rating rules for an online-course
//! platform.
//!
//! The domain modules (`enrollment`, `progress`, `quiz`, `rating`,
//! `curriculum`) are pure transformations of in-memory documents. `service`
//! wires them to the repositories in `store` (in-memory) and `db` (Postgres).

pub mod config;
pub mod curriculum;
pub mod db;
pub mod enrollment;
pub mod error;
pub mod models;
pub mod progress;
pub mod quiz;
pub mod rating;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, ErrorCategory, Result};
pub use service::CourseService;
