//! Persistence layer for the conference registry backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - PostgreSQL implementations of the domain repository traits

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;

pub use repositories::postgres_repositories;
