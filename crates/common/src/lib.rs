//! Shared utilities, configuration, and error handling for Skillgate
//!
//! This crate provides common functionality used across the Skillgate service:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - Database helpers shared by domain repositories
//! - Request extractors

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod state;

pub use db::{begin_bounded, is_unique_violation, RepositoryError, DEFAULT_STATEMENT_TIMEOUT};
pub use error::{Error, Rejection, Result};
pub use extractors::{Pagination, ValidatedJson};
pub use state::StateError;
