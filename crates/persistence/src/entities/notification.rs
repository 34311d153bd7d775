//! Notification entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use domain::models::{Notification, NotificationKind};
use domain::RepositoryError;

/// Database row mapping for the notifications table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationEntity {
    pub id: i64,
    pub user_id: i64,
    pub event_id: Option<i64>,
    pub registration_id: Option<i64>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub dedup_day: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationEntity> for Notification {
    type Error = RepositoryError;

    fn try_from(entity: NotificationEntity) -> Result<Self, Self::Error> {
        let kind = NotificationKind::from_str(&entity.kind).ok_or_else(|| {
            RepositoryError::Backend(format!("unknown notification kind '{}'", entity.kind))
        })?;
        Ok(Self {
            id: entity.id,
            user_id: entity.user_id,
            event_id: entity.event_id,
            registration_id: entity.registration_id,
            kind,
            title: entity.title,
            message: entity.message,
            read: entity.is_read,
            dedup_day: entity.dedup_day,
            created_at: entity.created_at,
        })
    }
}
