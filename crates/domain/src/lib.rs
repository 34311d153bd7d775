//! Domain layer for the conference registry backend.
//!
//! This crate contains:
//! - Domain models (Event, Registration, Notification, User)
//! - Repository traits the core reads and writes through, plus in-memory
//!   implementations
//! - Business logic services (event catalog, registration ledger,
//!   notification scheduler)
//! - Domain error types

pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

pub use error::{DomainError, RepositoryError};
