//! Repository contracts the core reads and writes through.
//!
//! The domain never talks to storage directly. PostgreSQL implementations
//! live in the `persistence` crate; [`memory::InMemoryStore`] backs tests and
//! database-less runs.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{DomainError, RepositoryError};
use crate::models::{
    Event, EventDraft, NewNotification, NewRegistration, Notification, NotificationPreferences,
    Registration, RegistrationFilter, RegistrationStatus, RegistrationView, StatusChange,
    StatusHistoryEntry, User,
};

pub use memory::InMemoryStore;

/// Check run against every active event while a catalog write is serialized.
pub type CatalogGuard<'a> = &'a (dyn Fn(&[Event]) -> Result<(), DomainError> + Send + Sync);

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Finds an event by id, cancelled ones included.
    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, RepositoryError>;

    /// Lists non-cancelled events ordered by start.
    async fn list_active(&self) -> Result<Vec<Event>, RepositoryError>;

    /// Inserts `draft` if `guard` accepts the current active events.
    ///
    /// No other catalog write may interleave between the scan handed to
    /// `guard` and the insert.
    async fn insert_guarded(
        &self,
        draft: EventDraft,
        now: DateTime<Utc>,
        guard: CatalogGuard<'_>,
    ) -> Result<Event, DomainError>;

    /// Rewrites an active event if `guard` accepts the current active events.
    ///
    /// Returns `Ok(None)` when the event is absent or cancelled.
    async fn update_guarded(
        &self,
        id: i64,
        draft: EventDraft,
        now: DateTime<Utc>,
        guard: CatalogGuard<'_>,
    ) -> Result<Option<Event>, DomainError>;

    /// Sets the manual-open flag of an active event.
    async fn set_manual_open(
        &self,
        id: i64,
        open: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, RepositoryError>;

    /// Marks an active event cancelled. `None` when absent or already cancelled.
    async fn cancel(&self, id: i64, now: DateTime<Utc>) -> Result<Option<Event>, RepositoryError>;

    /// Active events whose registration closes on `day`.
    async fn find_closing_on(&self, day: NaiveDate) -> Result<Vec<Event>, RepositoryError>;

    /// Active events that start on `day`.
    async fn find_starting_on(&self, day: NaiveDate) -> Result<Vec<Event>, RepositoryError>;
}

#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Registration>, RepositoryError>;

    /// The active registration of `user_id` for `event_id`, if any.
    async fn find_active(
        &self,
        event_id: i64,
        user_id: i64,
    ) -> Result<Option<Registration>, RepositoryError>;

    /// Inserts a registration together with its initial history row.
    ///
    /// Fails with [`RepositoryError::Conflict`] when the pair already has an
    /// active registration.
    async fn insert(
        &self,
        registration: NewRegistration,
        initial: StatusChange,
    ) -> Result<Registration, RepositoryError>;

    /// Sets the status of an active registration and appends the history row
    /// capturing the previous status, atomically.
    async fn update_status(
        &self,
        id: i64,
        change: StatusChange,
    ) -> Result<Option<(Registration, StatusHistoryEntry)>, RepositoryError>;

    async fn update_payment(
        &self,
        id: i64,
        paid: bool,
        payment_proof: Option<String>,
    ) -> Result<Option<Registration>, RepositoryError>;

    /// Marks an active registration cancelled.
    async fn cancel(&self, id: i64) -> Result<Option<Registration>, RepositoryError>;

    /// Active registrations matching `filter`, newest first.
    async fn list(&self, filter: &RegistrationFilter)
        -> Result<Vec<RegistrationView>, RepositoryError>;

    /// Active registration counts per status for `filter`.
    async fn count_by_status(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<(RegistrationStatus, i64)>, RepositoryError>;

    /// History rows of a registration, newest first.
    async fn history(&self, id: i64) -> Result<Vec<StatusHistoryEntry>, RepositoryError>;

    /// Active registrations of one event.
    async fn list_active_for_event(
        &self,
        event_id: i64,
    ) -> Result<Vec<Registration>, RepositoryError>;

    /// Active registrations that are unpaid and still pending.
    async fn list_awaiting_payment(&self) -> Result<Vec<Registration>, RepositoryError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;

    /// Stored preferences of a user, `None` when never written.
    async fn preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<NotificationPreferences>, RepositoryError>;

    async fn save_preferences(
        &self,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Inserts a notification that carries no dedup key.
    async fn insert(&self, notification: NewNotification)
        -> Result<Notification, RepositoryError>;

    /// Inserts a notification unless one with the same
    /// (user, event, kind, `day`) already exists.
    ///
    /// Returns `Ok(None)` when the key was taken.
    async fn insert_if_absent(
        &self,
        notification: NewNotification,
        day: NaiveDate,
    ) -> Result<Option<Notification>, RepositoryError>;

    /// Notifications of a user, newest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>, RepositoryError>;

    async fn mark_read(&self, id: i64, read: bool)
        -> Result<Option<Notification>, RepositoryError>;
}

/// Last successful run per job name.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(&self, job: &str) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    async fn put(&self, job: &str, ran_at: DateTime<Utc>) -> Result<(), RepositoryError>;
}
