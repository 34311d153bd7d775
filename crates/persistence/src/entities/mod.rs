//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod event;
pub mod notification;
pub mod registration;
pub mod user;

pub use event::EventEntity;
pub use notification::NotificationEntity;
pub use registration::{RegistrationEntity, RegistrationViewEntity, StatusHistoryEntity};
pub use user::{NotificationPreferencesEntity, UserEntity};
