//! Event domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::dates::format_date;
use validator::Validate;

/// A scheduled conference with a date window and a registration deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub registration_closes_at: DateTime<Utc>,
    pub location: String,
    pub manual_open: bool,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Whether `[start, end]` intersects this event's window, bounds included.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !(start > self.ends_at) && !(end < self.starts_at)
    }

    /// Whether this event's name matches `name`, ignoring case and
    /// surrounding whitespace.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }

    /// Whether sign-ups are accepted at `now`.
    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        self.manual_open && now < self.registration_closes_at && now < self.starts_at
    }
}

/// Validated field values for inserting or rewriting an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub registration_closes_at: DateTime<Utc>,
    pub location: String,
}

/// Request payload for creating or updating an event.
///
/// Dates arrive as `DD/MM/YYYY` or `DD/MM/YYYY HH:MM:SS` text.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EventRequest {
    #[serde(rename = "nombre")]
    #[validate(custom(function = "shared::validation::validate_event_name"))]
    pub name: String,

    #[serde(rename = "fecha_inicio")]
    pub start: String,

    #[serde(rename = "fecha_fin")]
    pub end: String,

    #[serde(rename = "fecha_cierre_inscripcion")]
    pub registration_close: String,

    #[serde(rename = "ubicacion")]
    #[validate(custom(function = "shared::validation::validate_location"))]
    pub location: String,
}

/// Response payload for event operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventResponse {
    #[serde(rename = "id_evento")]
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "fecha_inicio")]
    pub start: String,
    #[serde(rename = "fecha_fin")]
    pub end: String,
    #[serde(rename = "fecha_cierre_inscripcion")]
    pub registration_close: String,
    #[serde(rename = "ubicacion")]
    pub location: String,
    #[serde(rename = "inscripciones_abiertas")]
    pub registration_open: bool,
}

impl EventResponse {
    pub fn from_event(event: &Event, now: DateTime<Utc>) -> Self {
        Self {
            id: event.id,
            name: event.name.clone(),
            start: format_date(event.starts_at),
            end: format_date(event.ends_at),
            registration_close: format_date(event.registration_closes_at),
            location: event.location.clone(),
            registration_open: event.is_registration_open(now),
        }
    }
}

/// A `[start, end]` window already taken by an active event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OccupiedRange {
    #[serde(rename = "fecha_inicio")]
    pub start: String,
    #[serde(rename = "fecha_fin")]
    pub end: String,
}

impl From<&Event> for OccupiedRange {
    fn from(event: &Event) -> Self {
        Self {
            start: format_date(event.starts_at),
            end: format_date(event.ends_at),
        }
    }
}

/// Query parameters for the close/open sub-action.
#[derive(Debug, Clone, Deserialize)]
pub struct EventActionQuery {
    pub action: String,
}

/// Sub-action applied to an event's registration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationWindowAction {
    Close,
    Open,
}

impl RegistrationWindowAction {
    /// Parses the wire action name (`cerrar` or `abrir`).
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim().to_lowercase().as_str() {
            "cerrar" | "close" => Some(Self::Close),
            "abrir" | "open" => Some(Self::Open),
            _ => None,
        }
    }
}
