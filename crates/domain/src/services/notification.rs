//! Notification delivery, inbox and preferences.
//!
//! Every notification is persisted first and then handed to the [`Mailer`].
//! The trigger methods called by the catalog and the ledger return `()`:
//! a failed notification never changes the outcome of the operation that
//! fired it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::dates::{format_date, format_date_time};
use shared::Clock;
use tracing::{debug, info, warn};

use super::mail::{MailMessage, Mailer};
use crate::error::{DomainError, RepositoryError};
use crate::models::{
    Event, NewNotification, Notification, NotificationKind, NotificationPreferences,
    Registration, RegistrationStatus, User,
};
use crate::repositories::{NotificationRepository, RegistrationRepository, UserDirectory};

/// Message bodies, in the language users read them in.
pub mod messages {
    use super::*;

    pub fn registration_confirmed(event: &Event) -> String {
        format!(
            "Te has inscrito exitosamente al evento '{}', que inicia el {} y finaliza el {}.",
            event.name,
            format_date(event.starts_at),
            format_date(event.ends_at)
        )
    }

    pub fn closing_soon(event: &Event) -> String {
        format!(
            "¡Última oportunidad! Las inscripciones para el evento '{}' cierran el {}. ¡No te quedes fuera!",
            event.name,
            format_date(event.registration_closes_at)
        )
    }

    pub fn event_reminder(event: &Event) -> String {
        format!(
            "Recuerda que el evento '{}' al que te inscribiste inicia el {}.",
            event.name,
            format_date(event.starts_at)
        )
    }

    pub fn payment_due(event: &Event) -> String {
        format!(
            "Tienes un pago pendiente para el evento '{}', que inicia el {}. Por favor, regulariza tu situación para asegurar tu participación.",
            event.name,
            format_date(event.starts_at)
        )
    }

    pub fn registration_reopened(event: &Event) -> String {
        format!(
            "¡Ya puedes inscribirte al evento '{}'! Las inscripciones están abiertas hasta el {}.",
            event.name,
            format_date(event.registration_closes_at)
        )
    }

    pub fn event_cancelled(event: &Event) -> String {
        format!(
            "Lamentamos informarte que el evento '{}' ha sido cancelado. Si ya te habías inscrito, recibirás un reembolso completo. Disculpa las molestias.",
            event.name
        )
    }

    pub fn status_changed_subject(status: RegistrationStatus) -> String {
        format!("{}: {}", NotificationKind::StatusChanged.title(), status)
    }

    pub fn status_changed(
        participant: &str,
        event_name: &str,
        status: RegistrationStatus,
        when: &str,
        note: &str,
    ) -> String {
        let mut body = format!(
            "Hola {},\n\nTu estado de inscripción cambió a: {}.\nEvento: {}\nFecha: {}.",
            participant, status, event_name, when
        );
        let note = note.trim();
        if !note.is_empty() {
            body.push_str(&format!("\nDetalles: {}.", note));
        }
        body
    }
}

/// Result of an insert-if-absent delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Stored and handed to the mailer.
    Sent,
    /// The dedup key was already taken.
    Duplicate,
}

/// Event-driven notification triggers fired by the catalog and the ledger.
///
/// Implementations swallow and log their own failures.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn registration_confirmed(&self, registration: &Registration, event: &Event);
    async fn status_changed(&self, registration: &Registration, event_name: &str, note: &str);
    async fn registration_reopened(&self, event: &Event);
    async fn event_cancelled(&self, event: &Event);
}

pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
    registrations: Arc<dyn RegistrationRepository>,
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        registrations: Arc<dyn RegistrationRepository>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifications,
            registrations,
            users,
            mailer,
            clock,
        }
    }

    /// Confirms a new registration to the participant.
    pub async fn registration_confirmed(&self, registration: &Registration, event: &Event) {
        let notification = NewNotification::for_event(
            registration.user_id,
            event.id,
            NotificationKind::RegistrationConfirmed,
            messages::registration_confirmed(event),
            self.clock.now(),
        )
        .with_registration(registration.id);

        if let Err(e) = self
            .store_and_mail(
                notification,
                &registration.email,
                Some(&registration.participant_name),
            )
            .await
        {
            warn!(
                registration_id = registration.id,
                error = %e,
                "Failed to deliver registration confirmation"
            );
        }
    }

    /// Tells the participant their status changed, if their preferences allow it.
    pub async fn status_changed(&self, registration: &Registration, event_name: &str, note: &str) {
        let preferences = match self.preferences_or_default(registration.user_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    user_id = registration.user_id,
                    error = %e,
                    "Failed to load notification preferences"
                );
                return;
            }
        };
        if !preferences.wants_status_alerts() {
            debug!(
                user_id = registration.user_id,
                "Status alerts disabled, skipping notification"
            );
            return;
        }

        let now = self.clock.now();
        let notification = NewNotification::for_event(
            registration.user_id,
            registration.event_id,
            NotificationKind::StatusChanged,
            messages::status_changed(
                &registration.participant_name,
                event_name,
                registration.status,
                &format_date_time(now),
                note,
            ),
            now,
        )
        .with_registration(registration.id)
        .with_title(messages::status_changed_subject(registration.status));

        if let Err(e) = self
            .store_and_mail(
                notification,
                &registration.email,
                Some(&registration.participant_name),
            )
            .await
        {
            warn!(
                registration_id = registration.id,
                error = %e,
                "Failed to deliver status change notification"
            );
        }
    }

    /// Announces a reopened registration window to every user.
    pub async fn registration_reopened(&self, event: &Event) {
        let users = match self.users.list_all().await {
            Ok(users) => users,
            Err(e) => {
                warn!(event_id = event.id, error = %e, "Failed to list users for reopen notice");
                return;
            }
        };

        let message = messages::registration_reopened(event);
        let sent = self
            .deliver_to_all(&users, event, NotificationKind::RegistrationReopened, &message)
            .await;
        info!(event_id = event.id, sent, "Registration reopened notices delivered");
    }

    /// Tells every registrant that the event was cancelled.
    pub async fn event_cancelled(&self, event: &Event) {
        let registrations = match self.registrations.list_active_for_event(event.id).await {
            Ok(r) => r,
            Err(e) => {
                warn!(event_id = event.id, error = %e, "Failed to list registrants for cancellation notice");
                return;
            }
        };

        let mut users = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            match self.users.find_by_id(registration.user_id).await {
                Ok(Some(user)) => users.push(user),
                Ok(None) => debug!(user_id = registration.user_id, "Registrant not in directory"),
                Err(e) => warn!(user_id = registration.user_id, error = %e, "Failed to load registrant"),
            }
        }

        let message = messages::event_cancelled(event);
        let sent = self
            .deliver_to_all(&users, event, NotificationKind::EventCancelled, &message)
            .await;
        info!(event_id = event.id, sent, "Event cancellation notices delivered");
    }

    /// Stores `notification` unless its dedup key for `day` is taken, then mails it.
    pub async fn deliver_once(
        &self,
        user: &User,
        notification: NewNotification,
        day: NaiveDate,
    ) -> Result<Delivery, RepositoryError> {
        match self.notifications.insert_if_absent(notification, day).await? {
            Some(stored) => {
                self.mail(&stored, &user.email, Some(&user.name)).await;
                Ok(Delivery::Sent)
            }
            None => Ok(Delivery::Duplicate),
        }
    }

    /// Inbox of a user, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>, DomainError> {
        self.require_user(user_id).await?;
        Ok(self.notifications.list_for_user(user_id).await?)
    }

    pub async fn mark_read(&self, id: i64, read: bool) -> Result<Notification, DomainError> {
        self.notifications
            .mark_read(id, read)
            .await?
            .ok_or(DomainError::NotificationNotFound)
    }

    /// Preferences of a user, materializing the defaults on first read.
    pub async fn preferences(&self, user_id: i64) -> Result<NotificationPreferences, DomainError> {
        self.require_user(user_id).await?;
        match self.users.preferences(user_id).await? {
            Some(p) => Ok(p),
            None => Ok(self
                .users
                .save_preferences(NotificationPreferences::defaults_for(user_id))
                .await?),
        }
    }

    pub async fn update_preferences(
        &self,
        user_id: i64,
        frequency: &str,
        kinds: &str,
        enabled: bool,
    ) -> Result<NotificationPreferences, DomainError> {
        shared::validation::validate_not_blank(frequency)?;
        shared::validation::validate_not_blank(kinds)?;
        self.require_user(user_id).await?;

        let saved = self
            .users
            .save_preferences(NotificationPreferences {
                user_id,
                frequency: frequency.trim().to_string(),
                kinds: kinds.trim().to_string(),
                enabled,
            })
            .await?;
        info!(user_id, enabled, "Notification preferences updated");
        Ok(saved)
    }

    async fn require_user(&self, user_id: i64) -> Result<User, DomainError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(DomainError::UserNotFound)
    }

    async fn preferences_or_default(
        &self,
        user_id: i64,
    ) -> Result<NotificationPreferences, RepositoryError> {
        Ok(self
            .users
            .preferences(user_id)
            .await?
            .unwrap_or_else(|| NotificationPreferences::defaults_for(user_id)))
    }

    async fn deliver_to_all(
        &self,
        users: &[User],
        event: &Event,
        kind: NotificationKind,
        message: &str,
    ) -> usize {
        let today = self.clock.now().date_naive();
        let mut sent = 0;
        for user in users {
            let notification =
                NewNotification::for_event(user.id, event.id, kind, message.to_string(), self.clock.now());
            match self.deliver_once(user, notification, today).await {
                Ok(Delivery::Sent) => sent += 1,
                Ok(Delivery::Duplicate) => {}
                Err(e) => warn!(user_id = user.id, event_id = event.id, kind = %kind, error = %e, "Failed to store notification"),
            }
        }
        sent
    }

    async fn store_and_mail(
        &self,
        notification: NewNotification,
        to_email: &str,
        to_name: Option<&str>,
    ) -> Result<Notification, RepositoryError> {
        let stored = self.notifications.insert(notification).await?;
        self.mail(&stored, to_email, to_name).await;
        Ok(stored)
    }

    async fn mail(&self, notification: &Notification, to_email: &str, to_name: Option<&str>) {
        let message = MailMessage {
            to_email: to_email.to_string(),
            to_name: to_name.map(str::to_string),
            subject: notification.title.clone(),
            body: notification.message.clone(),
        };
        if let Err(e) = self.mailer.send(message).await {
            warn!(
                notification_id = notification.id,
                kind = %notification.kind,
                error = %e,
                "Failed to send notification mail"
            );
        }
    }
}

#[async_trait]
impl NotificationDispatcher for NotificationService {
    async fn registration_confirmed(&self, registration: &Registration, event: &Event) {
        NotificationService::registration_confirmed(self, registration, event).await
    }

    async fn status_changed(&self, registration: &Registration, event_name: &str, note: &str) {
        NotificationService::status_changed(self, registration, event_name, note).await
    }

    async fn registration_reopened(&self, event: &Event) {
        NotificationService::registration_reopened(self, event).await
    }

    async fn event_cancelled(&self, event: &Event) {
        NotificationService::event_cancelled(self, event).await
    }
}
