//! Event catalog repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use domain::models::{Event, EventDraft};
use domain::repositories::{CatalogGuard, EventRepository};
use domain::{DomainError, RepositoryError};

use crate::entities::EventEntity;
use crate::error::db_error;
use crate::metrics::QueryTimer;

/// Advisory lock key serializing catalog writes across connections.
const CATALOG_LOCK_KEY: i64 = 0x4556_454e_5453;

const EVENT_COLUMNS: &str = "id, name, starts_at, ends_at, registration_closes_at, location, \
                             manual_open, cancelled, created_at, updated_at";

/// PostgreSQL-backed event catalog.
#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new PgEventRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a transaction holding the catalog lock and returns the active events.
    async fn lock_catalog(
        &self,
    ) -> Result<(Transaction<'static, Postgres>, Vec<Event>), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CATALOG_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let active = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE NOT cancelled ORDER BY starts_at ASC"
        ))
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(Event::from)
        .collect();

        Ok((tx, active))
    }

    async fn fetch_by_day(
        &self,
        query_name: &'static str,
        column: &str,
        day: NaiveDate,
    ) -> Result<Vec<Event>, RepositoryError> {
        let timer = QueryTimer::new(query_name);
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE NOT cancelled AND ({column} AT TIME ZONE 'UTC')::date = $1 \
             ORDER BY starts_at ASC"
        ))
        .bind(day)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result
            .map_err(db_error)?
            .into_iter()
            .map(Event::from)
            .collect())
    }
}

/// A unique violation after the guard passed means a concurrent writer won the name.
fn name_conflict(name: &str) -> impl FnOnce(RepositoryError) -> DomainError + '_ {
    move |err| match err {
        RepositoryError::Conflict(_) => DomainError::NameExists(name.to_string()),
        other => DomainError::Repository(other),
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, RepositoryError> {
        let timer = QueryTimer::new("find_event_by_id");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(db_error)?.map(Event::from))
    }

    async fn list_active(&self) -> Result<Vec<Event>, RepositoryError> {
        let timer = QueryTimer::new("list_active_events");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE NOT cancelled ORDER BY starts_at ASC"
        ))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result
            .map_err(db_error)?
            .into_iter()
            .map(Event::from)
            .collect())
    }

    async fn insert_guarded(
        &self,
        draft: EventDraft,
        now: DateTime<Utc>,
        guard: CatalogGuard<'_>,
    ) -> Result<Event, DomainError> {
        let timer = QueryTimer::new("insert_event");
        let (mut tx, active) = self.lock_catalog().await?;
        guard(&active)?;

        let entity = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            INSERT INTO events (name, starts_at, ends_at, registration_closes_at, location,
                                manual_open, cancelled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, true, false, $6, $6)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(&draft.name)
        .bind(draft.starts_at)
        .bind(draft.ends_at)
        .bind(draft.registration_closes_at)
        .bind(&draft.location)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)
        .map_err(name_conflict(&draft.name))?;

        tx.commit().await.map_err(db_error)?;
        timer.record();
        Ok(entity.into())
    }

    async fn update_guarded(
        &self,
        id: i64,
        draft: EventDraft,
        now: DateTime<Utc>,
        guard: CatalogGuard<'_>,
    ) -> Result<Option<Event>, DomainError> {
        let timer = QueryTimer::new("update_event");
        let (mut tx, active) = self.lock_catalog().await?;
        if !active.iter().any(|event| event.id == id) {
            return Ok(None);
        }
        guard(&active)?;

        let entity = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events
            SET name = $2, starts_at = $3, ends_at = $4, registration_closes_at = $5,
                location = $6, updated_at = $7
            WHERE id = $1 AND NOT cancelled
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.name)
        .bind(draft.starts_at)
        .bind(draft.ends_at)
        .bind(draft.registration_closes_at)
        .bind(&draft.location)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)
        .map_err(name_conflict(&draft.name))?;

        tx.commit().await.map_err(db_error)?;
        timer.record();
        Ok(entity.map(Event::from))
    }

    async fn set_manual_open(
        &self,
        id: i64,
        open: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, RepositoryError> {
        let timer = QueryTimer::new("set_event_manual_open");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events
            SET manual_open = $2, updated_at = $3
            WHERE id = $1 AND NOT cancelled
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(open)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(db_error)?.map(Event::from))
    }

    async fn cancel(&self, id: i64, now: DateTime<Utc>) -> Result<Option<Event>, RepositoryError> {
        let timer = QueryTimer::new("cancel_event");
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CATALOG_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let entity = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events
            SET cancelled = true, updated_at = $2
            WHERE id = $1 AND NOT cancelled
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        timer.record();
        Ok(entity.map(Event::from))
    }

    async fn find_closing_on(&self, day: NaiveDate) -> Result<Vec<Event>, RepositoryError> {
        self.fetch_by_day("find_events_closing_on", "registration_closes_at", day)
            .await
    }

    async fn find_starting_on(&self, day: NaiveDate) -> Result<Vec<Event>, RepositoryError> {
        self.fetch_by_day("find_events_starting_on", "starts_at", day)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_conflict_maps_unique_violation() {
        let map = name_conflict("Congreso de Software");
        assert_eq!(
            map(RepositoryError::Conflict("events_active_name_key".into())),
            DomainError::NameExists("Congreso de Software".into())
        );
    }

    #[test]
    fn test_name_conflict_keeps_backend_errors() {
        let map = name_conflict("Congreso de Software");
        assert!(matches!(
            map(RepositoryError::Backend("down".into())),
            DomainError::Repository(RepositoryError::Backend(_))
        ));
    }
}
