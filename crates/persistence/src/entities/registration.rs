//! Registration and status history entities (database row mappings).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::{Registration, RegistrationStatus, RegistrationView, StatusHistoryEntry};
use domain::RepositoryError;

fn parse_status(value: &str) -> Result<RegistrationStatus, RepositoryError> {
    RegistrationStatus::parse(value)
        .ok_or_else(|| RepositoryError::Backend(format!("unknown registration status '{}'", value)))
}

/// Database row mapping for the registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub participant_name: String,
    pub email: String,
    pub affiliation: String,
    pub payment_proof: Option<String>,
    pub paid: bool,
    pub status: String,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<RegistrationEntity> for Registration {
    type Error = RepositoryError;

    fn try_from(entity: RegistrationEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            event_id: entity.event_id,
            user_id: entity.user_id,
            participant_name: entity.participant_name,
            email: entity.email,
            affiliation: entity.affiliation,
            payment_proof: entity.payment_proof,
            paid: entity.paid,
            status: parse_status(&entity.status)?,
            cancelled: entity.cancelled,
            created_at: entity.created_at,
        })
    }
}

/// Registration row joined with its event's name and close date.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationViewEntity {
    #[sqlx(flatten)]
    pub registration: RegistrationEntity,
    pub event_name: String,
    pub payment_deadline: DateTime<Utc>,
}

impl TryFrom<RegistrationViewEntity> for RegistrationView {
    type Error = RepositoryError;

    fn try_from(entity: RegistrationViewEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            registration: entity.registration.try_into()?,
            event_name: entity.event_name,
            payment_deadline: entity.payment_deadline,
        })
    }
}

/// Database row mapping for the registration_status_history table.
#[derive(Debug, Clone, FromRow)]
pub struct StatusHistoryEntity {
    pub id: i64,
    pub registration_id: i64,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub note: String,
    pub actor: String,
    pub changed_at: DateTime<Utc>,
}

impl TryFrom<StatusHistoryEntity> for StatusHistoryEntry {
    type Error = RepositoryError;

    fn try_from(entity: StatusHistoryEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            registration_id: entity.registration_id,
            previous_status: entity
                .previous_status
                .as_deref()
                .map(parse_status)
                .transpose()?,
            new_status: parse_status(&entity.new_status)?,
            note: entity.note,
            actor: entity.actor,
            changed_at: entity.changed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entity(status: &str) -> RegistrationEntity {
        RegistrationEntity {
            id: 1,
            event_id: 2,
            user_id: 3,
            participant_name: "Ana Torres".to_string(),
            email: "ana@example.com".to_string(),
            affiliation: "UNI".to_string(),
            payment_proof: None,
            paid: false,
            status: status.to_string(),
            cancelled: false,
            created_at: Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_registration_status_mapping() {
        let registration = Registration::try_from(entity("Pagado")).unwrap();
        assert_eq!(registration.status, RegistrationStatus::Paid);
    }

    #[test]
    fn test_unknown_status_is_backend_error() {
        let err = Registration::try_from(entity("Borrado")).unwrap_err();
        assert!(matches!(err, RepositoryError::Backend(_)));
    }

    #[test]
    fn test_initial_history_has_no_previous_status() {
        let entry = StatusHistoryEntry::try_from(StatusHistoryEntity {
            id: 9,
            registration_id: 1,
            previous_status: None,
            new_status: "Pendiente".to_string(),
            note: "Confirmada".to_string(),
            actor: "system".to_string(),
            changed_at: Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap(),
        })
        .unwrap();
        assert_eq!(entry.previous_status, None);
        assert_eq!(entry.new_status, RegistrationStatus::Pending);
    }
}
