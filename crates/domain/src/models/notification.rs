//! Notification domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::dates::format_date_time;

/// Kind of notification delivered to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "inscripcion")]
    RegistrationConfirmed,
    #[serde(rename = "cambio_estado")]
    StatusChanged,
    #[serde(rename = "cierre_inscripciones")]
    ClosingSoon,
    #[serde(rename = "recordatorio_evento")]
    EventReminder,
    #[serde(rename = "recordatorio_pago")]
    PaymentDue,
    #[serde(rename = "apertura_inscripciones")]
    RegistrationReopened,
    #[serde(rename = "cancelacion_evento")]
    EventCancelled,
}

impl NotificationKind {
    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RegistrationConfirmed => "inscripcion",
            NotificationKind::StatusChanged => "cambio_estado",
            NotificationKind::ClosingSoon => "cierre_inscripciones",
            NotificationKind::EventReminder => "recordatorio_evento",
            NotificationKind::PaymentDue => "recordatorio_pago",
            NotificationKind::RegistrationReopened => "apertura_inscripciones",
            NotificationKind::EventCancelled => "cancelacion_evento",
        }
    }

    /// Parses from database string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inscripcion" => Some(NotificationKind::RegistrationConfirmed),
            "cambio_estado" => Some(NotificationKind::StatusChanged),
            "cierre_inscripciones" => Some(NotificationKind::ClosingSoon),
            "recordatorio_evento" => Some(NotificationKind::EventReminder),
            "recordatorio_pago" => Some(NotificationKind::PaymentDue),
            "apertura_inscripciones" => Some(NotificationKind::RegistrationReopened),
            "cancelacion_evento" => Some(NotificationKind::EventCancelled),
            _ => None,
        }
    }

    /// Title shown in the inbox and used as the mail subject.
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::RegistrationConfirmed => "Inscripción exitosa",
            NotificationKind::StatusChanged => "Actualización de inscripción",
            NotificationKind::ClosingSoon => "Cierre de inscripciones",
            NotificationKind::EventReminder => "Recordatorio de evento",
            NotificationKind::PaymentDue => "Recordatorio de pago",
            NotificationKind::RegistrationReopened => "Apertura de inscripciones",
            NotificationKind::EventCancelled => "Cancelación de evento",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted notification in a user's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub event_id: Option<i64>,
    pub registration_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    /// Calendar day of the dedup key; only automated kinds carry one.
    pub dedup_day: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Values for inserting a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: i64,
    pub event_id: Option<i64>,
    pub registration_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// A notification about `event_id`, titled after its kind.
    pub fn for_event(
        user_id: i64,
        event_id: i64,
        kind: NotificationKind,
        message: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            event_id: Some(event_id),
            registration_id: None,
            kind,
            title: kind.title().to_string(),
            message,
            created_at,
        }
    }

    pub fn with_registration(mut self, registration_id: i64) -> Self {
        self.registration_id = Some(registration_id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Identity of an automated notification: one per user, event, kind and day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub user_id: i64,
    pub event_id: i64,
    pub kind: NotificationKind,
    pub day: NaiveDate,
}

impl Notification {
    pub fn dedup_key(&self) -> Option<DedupKey> {
        match (self.event_id, self.dedup_day) {
            (Some(event_id), Some(day)) => Some(DedupKey {
                user_id: self.user_id,
                event_id,
                kind: self.kind,
                day,
            }),
            _ => None,
        }
    }
}

/// Request payload for marking a notification read or unread.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkReadRequest {
    #[serde(rename = "leida", default = "default_read")]
    pub read: bool,
}

fn default_read() -> bool {
    true
}

/// Response payload for inbox listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResponse {
    #[serde(rename = "id_notificacion")]
    pub id: i64,
    #[serde(rename = "id_usuario")]
    pub user_id: i64,
    #[serde(rename = "id_evento", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    #[serde(rename = "id_inscripcion", skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<i64>,
    #[serde(rename = "tipo")]
    pub kind: NotificationKind,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "leida")]
    pub read: bool,
    #[serde(rename = "fecha_creacion")]
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id,
            event_id: n.event_id,
            registration_id: n.registration_id,
            kind: n.kind,
            title: n.title,
            message: n.message,
            read: n.read,
            created_at: format_date_time(n.created_at),
        }
    }
}
