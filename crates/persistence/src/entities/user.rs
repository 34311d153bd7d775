//! User directory entities (database row mappings).

use sqlx::FromRow;

use domain::models::{NotificationPreferences, User};

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            email: entity.email,
        }
    }
}

/// Database row mapping for the notification_preferences table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationPreferencesEntity {
    pub user_id: i64,
    pub frequency: String,
    pub kinds: String,
    pub enabled: bool,
}

impl From<NotificationPreferencesEntity> for NotificationPreferences {
    fn from(entity: NotificationPreferencesEntity) -> Self {
        Self {
            user_id: entity.user_id,
            frequency: entity.frequency,
            kinds: entity.kinds,
            enabled: entity.enabled,
        }
    }
}
