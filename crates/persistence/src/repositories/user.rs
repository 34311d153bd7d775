//! User directory repository for database operations.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::{NotificationPreferences, User};
use domain::repositories::UserDirectory;
use domain::RepositoryError;

use crate::entities::{NotificationPreferencesEntity, UserEntity};
use crate::error::db_error;
use crate::metrics::QueryTimer;

/// PostgreSQL-backed user directory.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Creates a new PgUserDirectory with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let timer = QueryTimer::new("find_user_by_id");
        let result =
            sqlx::query_as::<_, UserEntity>("SELECT id, name, email FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        timer.record();
        Ok(result.map_err(db_error)?.map(User::from))
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let timer = QueryTimer::new("list_users");
        let result =
            sqlx::query_as::<_, UserEntity>("SELECT id, name, email FROM users ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await;
        timer.record();
        Ok(result
            .map_err(db_error)?
            .into_iter()
            .map(User::from)
            .collect())
    }

    async fn preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<NotificationPreferences>, RepositoryError> {
        let timer = QueryTimer::new("find_notification_preferences");
        let result = sqlx::query_as::<_, NotificationPreferencesEntity>(
            r#"
            SELECT user_id, frequency, kinds, enabled
            FROM notification_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(db_error)?.map(NotificationPreferences::from))
    }

    async fn save_preferences(
        &self,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, RepositoryError> {
        let timer = QueryTimer::new("upsert_notification_preferences");
        let result = sqlx::query_as::<_, NotificationPreferencesEntity>(
            r#"
            INSERT INTO notification_preferences (user_id, frequency, kinds, enabled, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                frequency = EXCLUDED.frequency,
                kinds = EXCLUDED.kinds,
                enabled = EXCLUDED.enabled,
                updated_at = EXCLUDED.updated_at
            RETURNING user_id, frequency, kinds, enabled
            "#,
        )
        .bind(preferences.user_id)
        .bind(&preferences.frequency)
        .bind(&preferences.kinds)
        .bind(preferences.enabled)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(db_error)?.into())
    }
}
