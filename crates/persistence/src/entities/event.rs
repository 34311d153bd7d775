//! Event entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::Event;

/// Database row mapping for the events table.
#[derive(Debug, Clone, FromRow)]
pub struct EventEntity {
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

impl From<EventEntity> for Event {
    fn from(entity: EventEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            starts_at: entity.starts_at,
            ends_at: entity.ends_at,
            registration_closes_at: entity.registration_closes_at,
            location: entity.location,
            manual_open: entity.manual_open,
            cancelled: entity.cancelled,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entity_to_event() {
        let day = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        let entity = EventEntity {
            id: 3,
            name: "Congreso de Software".to_string(),
            starts_at: day,
            ends_at: day,
            registration_closes_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            location: "Lima, Perú".to_string(),
            manual_open: false,
            cancelled: true,
            created_at: day,
            updated_at: day,
        };
        let event: Event = entity.into();
        assert_eq!(event.id, 3);
        assert!(!event.manual_open);
        assert!(event.cancelled);
    }
}
