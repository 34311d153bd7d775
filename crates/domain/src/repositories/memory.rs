//! In-memory repositories.
//!
//! A single [`InMemoryStore`] implements every repository trait. All state
//! sits behind one mutex, so a guarded catalog write holds the lock across
//! its scan and its write.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use super::{
    CatalogGuard, EventRepository, NotificationRepository, RegistrationRepository,
    UserDirectory, WatermarkStore,
};
use crate::error::{DomainError, RepositoryError};
use crate::models::{
    DedupKey, Event, EventDraft, NewNotification, NewRegistration, Notification,
    NotificationPreferences, Registration, RegistrationFilter, RegistrationStatus,
    RegistrationView, StatusChange, StatusHistoryEntry, User,
};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, User>,
    preferences: HashMap<i64, NotificationPreferences>,
    events: BTreeMap<i64, Event>,
    registrations: BTreeMap<i64, Registration>,
    history: Vec<StatusHistoryEntry>,
    notifications: BTreeMap<i64, Notification>,
    dedup: HashSet<DedupKey>,
    watermarks: HashMap<String, DateTime<Utc>>,
    failing: HashSet<String>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, operation: &str) -> Result<(), RepositoryError> {
        if self.failing.contains(operation) {
            Err(RepositoryError::Backend(format!(
                "simulated failure in {}",
                operation
            )))
        } else {
            Ok(())
        }
    }

    fn active_events(&self) -> Vec<Event> {
        self.events
            .values()
            .filter(|e| !e.cancelled)
            .cloned()
            .collect()
    }

    fn view(&self, registration: &Registration) -> Option<RegistrationView> {
        self.events
            .get(&registration.event_id)
            .map(|event| RegistrationView {
                registration: registration.clone(),
                event_name: event.name.clone(),
                payment_deadline: event.registration_closes_at,
            })
    }

    fn matching(&self, filter: &RegistrationFilter) -> Vec<RegistrationView> {
        let mut views: Vec<RegistrationView> = self
            .registrations
            .values()
            .filter_map(|r| self.view(r))
            .filter(|v| filter.matches(v))
            .collect();
        views.sort_by(|a, b| {
            b.registration
                .created_at
                .cmp(&a.registration.created_at)
                .then(b.registration.id.cmp(&a.registration.id))
        });
        views
    }
}

/// Process-local store implementing every repository trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user to the directory.
    pub async fn add_user(&self, name: &str, email: &str) -> User {
        let mut state = self.state.lock().await;
        let user = User {
            id: state.next_id(),
            name: name.to_string(),
            email: email.to_string(),
        };
        state.users.insert(user.id, user.clone());
        user
    }

    /// Makes every later call of `operation` fail with a backend error.
    ///
    /// `operation` is the trait method name, e.g. `"find_closing_on"`.
    pub async fn fail_operation(&self, operation: &str) {
        self.state.lock().await.failing.insert(operation.to_string());
    }

    /// Stops simulating failures for `operation`.
    pub async fn restore_operation(&self, operation: &str) {
        self.state.lock().await.failing.remove(operation);
    }

    /// Every stored notification, in insertion order.
    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.state
            .lock()
            .await
            .notifications
            .values()
            .cloned()
            .collect()
    }

    /// Every stored registration, cancelled ones included.
    pub async fn all_registrations(&self) -> Vec<Registration> {
        self.state
            .lock()
            .await
            .registrations
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("find_event")?;
        Ok(state.events.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Event>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("list_active")?;
        let mut events = state.active_events();
        events.sort_by_key(|e| (e.starts_at, e.id));
        Ok(events)
    }

    async fn insert_guarded(
        &self,
        draft: EventDraft,
        now: DateTime<Utc>,
        guard: CatalogGuard<'_>,
    ) -> Result<Event, DomainError> {
        let mut state = self.state.lock().await;
        state.check("insert_guarded")?;
        guard(&state.active_events())?;

        let event = Event {
            id: state.next_id(),
            name: draft.name,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            registration_closes_at: draft.registration_closes_at,
            location: draft.location,
            manual_open: true,
            cancelled: false,
            created_at: now,
            updated_at: now,
        };
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_guarded(
        &self,
        id: i64,
        draft: EventDraft,
        now: DateTime<Utc>,
        guard: CatalogGuard<'_>,
    ) -> Result<Option<Event>, DomainError> {
        let mut state = self.state.lock().await;
        state.check("update_guarded")?;
        if !state.events.get(&id).is_some_and(|e| !e.cancelled) {
            return Ok(None);
        }
        guard(&state.active_events())?;

        let Some(event) = state.events.get_mut(&id) else {
            return Ok(None);
        };
        event.name = draft.name;
        event.starts_at = draft.starts_at;
        event.ends_at = draft.ends_at;
        event.registration_closes_at = draft.registration_closes_at;
        event.location = draft.location;
        event.updated_at = now;
        Ok(Some(event.clone()))
    }

    async fn set_manual_open(
        &self,
        id: i64,
        open: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("set_manual_open")?;
        Ok(state
            .events
            .get_mut(&id)
            .filter(|e| !e.cancelled)
            .map(|event| {
                event.manual_open = open;
                event.updated_at = now;
                event.clone()
            }))
    }

    async fn cancel(&self, id: i64, now: DateTime<Utc>) -> Result<Option<Event>, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("cancel_event")?;
        Ok(state
            .events
            .get_mut(&id)
            .filter(|e| !e.cancelled)
            .map(|event| {
                event.cancelled = true;
                event.updated_at = now;
                event.clone()
            }))
    }

    async fn find_closing_on(&self, day: NaiveDate) -> Result<Vec<Event>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("find_closing_on")?;
        Ok(state
            .active_events()
            .into_iter()
            .filter(|e| e.registration_closes_at.date_naive() == day)
            .collect())
    }

    async fn find_starting_on(&self, day: NaiveDate) -> Result<Vec<Event>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("find_starting_on")?;
        Ok(state
            .active_events()
            .into_iter()
            .filter(|e| e.starts_at.date_naive() == day)
            .collect())
    }
}

#[async_trait]
impl RegistrationRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Registration>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("find_registration")?;
        Ok(state.registrations.get(&id).cloned())
    }

    async fn find_active(
        &self,
        event_id: i64,
        user_id: i64,
    ) -> Result<Option<Registration>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("find_active")?;
        Ok(state
            .registrations
            .values()
            .find(|r| r.event_id == event_id && r.user_id == user_id && !r.cancelled)
            .cloned())
    }

    async fn insert(
        &self,
        registration: NewRegistration,
        initial: StatusChange,
    ) -> Result<Registration, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("insert_registration")?;
        let taken = state.registrations.values().any(|r| {
            r.event_id == registration.event_id
                && r.user_id == registration.user_id
                && !r.cancelled
        });
        if taken {
            return Err(RepositoryError::Conflict(
                "active registration exists for event and user".into(),
            ));
        }

        let stored = Registration {
            id: state.next_id(),
            event_id: registration.event_id,
            user_id: registration.user_id,
            participant_name: registration.participant_name,
            email: registration.email,
            affiliation: registration.affiliation,
            payment_proof: registration.payment_proof,
            paid: false,
            status: initial.status,
            cancelled: false,
            created_at: registration.created_at,
        };
        let entry = StatusHistoryEntry {
            id: state.next_id(),
            registration_id: stored.id,
            previous_status: None,
            new_status: initial.status,
            note: initial.note,
            actor: initial.actor,
            changed_at: initial.changed_at,
        };
        state.registrations.insert(stored.id, stored.clone());
        state.history.push(entry);
        Ok(stored)
    }

    async fn update_status(
        &self,
        id: i64,
        change: StatusChange,
    ) -> Result<Option<(Registration, StatusHistoryEntry)>, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("update_status")?;
        let entry_id = state.next_id();
        let Some(registration) = state.registrations.get_mut(&id).filter(|r| !r.cancelled) else {
            return Ok(None);
        };

        let entry = StatusHistoryEntry {
            id: entry_id,
            registration_id: id,
            previous_status: Some(registration.status),
            new_status: change.status,
            note: change.note,
            actor: change.actor,
            changed_at: change.changed_at,
        };
        registration.status = change.status;
        let updated = registration.clone();
        state.history.push(entry.clone());
        Ok(Some((updated, entry)))
    }

    async fn update_payment(
        &self,
        id: i64,
        paid: bool,
        payment_proof: Option<String>,
    ) -> Result<Option<Registration>, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("update_payment")?;
        Ok(state
            .registrations
            .get_mut(&id)
            .filter(|r| !r.cancelled)
            .map(|registration| {
                registration.paid = paid;
                if payment_proof.is_some() {
                    registration.payment_proof = payment_proof;
                }
                registration.clone()
            }))
    }

    async fn cancel(&self, id: i64) -> Result<Option<Registration>, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("cancel_registration")?;
        Ok(state
            .registrations
            .get_mut(&id)
            .filter(|r| !r.cancelled)
            .map(|registration| {
                registration.cancelled = true;
                registration.clone()
            }))
    }

    async fn list(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<RegistrationView>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("list_registrations")?;
        Ok(state.matching(filter))
    }

    async fn count_by_status(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<(RegistrationStatus, i64)>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("count_by_status")?;
        let mut counts: BTreeMap<RegistrationStatus, i64> = BTreeMap::new();
        for view in state.matching(filter) {
            *counts.entry(view.registration.status).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn history(&self, id: i64) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("history")?;
        let mut entries: Vec<StatusHistoryEntry> = state
            .history
            .iter()
            .filter(|h| h.registration_id == id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn list_active_for_event(
        &self,
        event_id: i64,
    ) -> Result<Vec<Registration>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("list_active_for_event")?;
        Ok(state
            .registrations
            .values()
            .filter(|r| r.event_id == event_id && !r.cancelled)
            .cloned()
            .collect())
    }

    async fn list_awaiting_payment(&self) -> Result<Vec<Registration>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("list_awaiting_payment")?;
        Ok(state
            .registrations
            .values()
            .filter(|r| r.is_awaiting_payment())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("find_user")?;
        Ok(state.users.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("list_users")?;
        Ok(state.users.values().cloned().collect())
    }

    async fn preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<NotificationPreferences>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("preferences")?;
        Ok(state.preferences.get(&user_id).cloned())
    }

    async fn save_preferences(
        &self,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("save_preferences")?;
        state
            .preferences
            .insert(preferences.user_id, preferences.clone());
        Ok(preferences)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("insert_notification")?;
        let stored = Notification {
            id: state.next_id(),
            user_id: notification.user_id,
            event_id: notification.event_id,
            registration_id: notification.registration_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            read: false,
            dedup_day: None,
            created_at: notification.created_at,
        };
        state.notifications.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_if_absent(
        &self,
        notification: NewNotification,
        day: NaiveDate,
    ) -> Result<Option<Notification>, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("insert_if_absent")?;
        let Some(event_id) = notification.event_id else {
            return Err(RepositoryError::Backend(
                "deduplicated notification requires an event".into(),
            ));
        };
        let key = DedupKey {
            user_id: notification.user_id,
            event_id,
            kind: notification.kind,
            day,
        };
        if !state.dedup.insert(key) {
            return Ok(None);
        }

        let stored = Notification {
            id: state.next_id(),
            user_id: notification.user_id,
            event_id: notification.event_id,
            registration_id: notification.registration_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            read: false,
            dedup_day: Some(day),
            created_at: notification.created_at,
        };
        state.notifications.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("list_for_user")?;
        let mut notifications: Vec<Notification> = state
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn mark_read(
        &self,
        id: i64,
        read: bool,
    ) -> Result<Option<Notification>, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("mark_read")?;
        Ok(state.notifications.get_mut(&id).map(|n| {
            n.read = read;
            n.clone()
        }))
    }
}

#[async_trait]
impl WatermarkStore for InMemoryStore {
    async fn get(&self, job: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let state = self.state.lock().await;
        state.check("get_watermark")?;
        Ok(state.watermarks.get(job).copied())
    }

    async fn put(&self, job: &str, ran_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.check("put_watermark")?;
        state.watermarks.insert(job.to_string(), ran_at);
        Ok(())
    }
}
