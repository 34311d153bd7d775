//! Domain services for the conference registry.
//!
//! Services contain business logic that operates on domain models and reach
//! storage only through the repository traits.

pub mod event_catalog;
pub mod mail;
pub mod notification;
pub mod registration_ledger;
pub mod scheduler;

use std::sync::Arc;

use shared::Clock;

pub use event_catalog::{is_registration_open, EventCatalog};
pub use mail::{MailError, MailMessage, Mailer, NoopMailer, RecordingMailer};
pub use notification::{Delivery, NotificationDispatcher, NotificationService};
pub use registration_ledger::RegistrationLedger;
pub use scheduler::{
    due_at, should_run, NotificationScheduler, PassReport, RuleOutcome, SchedulerSettings,
    TickOutcome,
};

use crate::repositories::{
    EventRepository, InMemoryStore, NotificationRepository, RegistrationRepository,
    UserDirectory, WatermarkStore,
};

/// Repository handles the services are built from.
#[derive(Clone)]
pub struct Repositories {
    pub events: Arc<dyn EventRepository>,
    pub registrations: Arc<dyn RegistrationRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub watermarks: Arc<dyn WatermarkStore>,
}

impl Repositories {
    /// Every repository backed by the same in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            events: store.clone(),
            registrations: store.clone(),
            users: store.clone(),
            notifications: store.clone(),
            watermarks: store,
        }
    }
}

/// The core services, wired together.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<EventCatalog>,
    pub ledger: Arc<RegistrationLedger>,
    pub notifications: Arc<NotificationService>,
    pub scheduler: Arc<NotificationScheduler>,
}

impl Services {
    pub fn new(
        repositories: Repositories,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        let notifications = Arc::new(NotificationService::new(
            repositories.notifications.clone(),
            repositories.registrations.clone(),
            repositories.users.clone(),
            mailer,
            clock.clone(),
        ));
        let catalog = Arc::new(EventCatalog::new(
            repositories.events.clone(),
            notifications.clone(),
            clock.clone(),
        ));
        let ledger = Arc::new(RegistrationLedger::new(
            catalog.clone(),
            repositories.registrations.clone(),
            repositories.users.clone(),
            notifications.clone(),
            clock.clone(),
        ));
        let scheduler = Arc::new(NotificationScheduler::new(
            repositories.events,
            repositories.registrations,
            repositories.users,
            repositories.watermarks,
            notifications.clone(),
            clock,
            settings,
        ));

        Self {
            catalog,
            ledger,
            notifications,
            scheduler,
        }
    }
}
