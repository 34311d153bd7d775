//! Notification repository for database operations.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use domain::models::{NewNotification, Notification};
use domain::repositories::NotificationRepository;
use domain::RepositoryError;

use crate::entities::NotificationEntity;
use crate::error::db_error;
use crate::metrics::QueryTimer;

const NOTIFICATION_COLUMNS: &str = "id, user_id, event_id, registration_id, kind, title, message, \
                                    is_read, dedup_day, created_at";

/// PostgreSQL-backed notification store.
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    /// Creates a new PgNotificationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row(
        &self,
        query_name: &'static str,
        notification: NewNotification,
        day: Option<NaiveDate>,
    ) -> Result<Option<Notification>, RepositoryError> {
        let timer = QueryTimer::new(query_name);
        let result = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"
            INSERT INTO notifications (user_id, event_id, registration_id, kind, title, message,
                                       is_read, dedup_day, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, false, $7, $8)
            ON CONFLICT (user_id, event_id, kind, dedup_day) WHERE dedup_day IS NOT NULL
            DO NOTHING
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification.user_id)
        .bind(notification.event_id)
        .bind(notification.registration_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(day)
        .bind(notification.created_at)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(db_error)?
            .map(Notification::try_from)
            .transpose()
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        // Rows without a dedup day never hit the partial unique index
        self.insert_row("insert_notification", notification, None)
            .await?
            .ok_or_else(|| RepositoryError::Backend("notification insert returned no row".into()))
    }

    async fn insert_if_absent(
        &self,
        notification: NewNotification,
        day: NaiveDate,
    ) -> Result<Option<Notification>, RepositoryError> {
        self.insert_row("insert_notification_if_absent", notification, Some(day))
            .await
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>, RepositoryError> {
        let timer = QueryTimer::new("list_notifications_for_user");
        let result = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
            .map_err(db_error)?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn mark_read(
        &self,
        id: i64,
        read: bool,
    ) -> Result<Option<Notification>, RepositoryError> {
        let timer = QueryTimer::new("mark_notification_read");
        let result = sqlx::query_as::<_, NotificationEntity>(&format!(
            "UPDATE notifications SET is_read = $2 WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(read)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(db_error)?
            .map(Notification::try_from)
            .transpose()
    }
}
