//! Domain models for the conference registry.

pub mod event;
pub mod notification;
pub mod registration;
pub mod user;

pub use event::{Event, EventDraft};
pub use notification::{DedupKey, NewNotification, Notification, NotificationKind};
pub use registration::{
    NewRegistration, Registration, RegistrationFilter, RegistrationStatus, RegistrationView,
    StatusChange, StatusHistoryEntry,
};
pub use user::{NotificationPreferences, User};
