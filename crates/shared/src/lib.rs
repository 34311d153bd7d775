//! Shared utilities and common types for the conference registry backend.
//!
//! This crate provides functionality used across all other crates:
//! - Calendar date parsing and rendering in the `DD/MM/YYYY` wire format
//! - A clock abstraction so time-dependent rules can be tested
//! - Common text validation logic

pub mod clock;
pub mod dates;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
