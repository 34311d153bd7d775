//! Registration ledger repository for database operations.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use domain::models::{
    NewRegistration, Registration, RegistrationFilter, RegistrationStatus, RegistrationView,
    StatusChange, StatusHistoryEntry,
};
use domain::repositories::RegistrationRepository;
use domain::RepositoryError;

use crate::entities::{RegistrationEntity, RegistrationViewEntity, StatusHistoryEntity};
use crate::error::db_error;
use crate::metrics::QueryTimer;

const REGISTRATION_COLUMNS: &str = "id, event_id, user_id, participant_name, email, affiliation, \
                                    payment_proof, paid, status, cancelled, created_at";

const HISTORY_COLUMNS: &str =
    "id, registration_id, previous_status, new_status, note, actor, changed_at";

/// Escapes `LIKE` metacharacters so user text matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Appends the `WHERE` clause for `filter` over `registrations r JOIN events e`.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &RegistrationFilter) {
    builder.push(" WHERE NOT r.cancelled");
    if let Some(user_id) = filter.user_id {
        builder.push(" AND r.user_id = ").push_bind(user_id);
    }
    if let Some(event_id) = filter.event_id {
        builder.push(" AND r.event_id = ").push_bind(event_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND r.status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.from {
        builder
            .push(" AND (r.created_at AT TIME ZONE 'UTC')::date >= ")
            .push_bind(from);
    }
    if let Some(to) = filter.to {
        builder
            .push(" AND (r.created_at AT TIME ZONE 'UTC')::date <= ")
            .push_bind(to);
    }
    if let Some(query) = filter.normalized_query() {
        let pattern = like_pattern(&query);
        builder
            .push(" AND (r.participant_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn into_registrations(
    rows: Vec<RegistrationEntity>,
) -> Result<Vec<Registration>, RepositoryError> {
    rows.into_iter().map(Registration::try_from).collect()
}

/// PostgreSQL-backed registration ledger.
#[derive(Clone)]
pub struct PgRegistrationRepository {
    pool: PgPool,
}

impl PgRegistrationRepository {
    /// Creates a new PgRegistrationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrationRepository for PgRegistrationRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Registration>, RepositoryError> {
        let timer = QueryTimer::new("find_registration_by_id");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(db_error)?
            .map(Registration::try_from)
            .transpose()
    }

    async fn find_active(
        &self,
        event_id: i64,
        user_id: i64,
    ) -> Result<Option<Registration>, RepositoryError> {
        let timer = QueryTimer::new("find_active_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM registrations
            WHERE event_id = $1 AND user_id = $2 AND NOT cancelled
            "#
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(db_error)?
            .map(Registration::try_from)
            .transpose()
    }

    async fn insert(
        &self,
        registration: NewRegistration,
        initial: StatusChange,
    ) -> Result<Registration, RepositoryError> {
        let timer = QueryTimer::new("insert_registration");

        // The registration and its first history row land together or not at all
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let entity = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            INSERT INTO registrations (event_id, user_id, participant_name, email, affiliation,
                                       payment_proof, paid, status, cancelled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, false, $7, false, $8)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(registration.event_id)
        .bind(registration.user_id)
        .bind(&registration.participant_name)
        .bind(&registration.email)
        .bind(&registration.affiliation)
        .bind(&registration.payment_proof)
        .bind(initial.status.as_str())
        .bind(registration.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO registration_status_history
                (registration_id, previous_status, new_status, note, actor, changed_at)
            VALUES ($1, NULL, $2, $3, $4, $5)
            "#,
        )
        .bind(entity.id)
        .bind(initial.status.as_str())
        .bind(&initial.note)
        .bind(&initial.actor)
        .bind(initial.changed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        timer.record();
        entity.try_into()
    }

    async fn update_status(
        &self,
        id: i64,
        change: StatusChange,
    ) -> Result<Option<(Registration, StatusHistoryEntry)>, RepositoryError> {
        let timer = QueryTimer::new("update_registration_status");
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let previous: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM registrations WHERE id = $1 AND NOT cancelled FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some((previous,)) = previous else {
            return Ok(None);
        };

        let entity = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "UPDATE registrations SET status = $2 WHERE id = $1 RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(id)
        .bind(change.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        let history = sqlx::query_as::<_, StatusHistoryEntity>(&format!(
            r#"
            INSERT INTO registration_status_history
                (registration_id, previous_status, new_status, note, actor, changed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {HISTORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&previous)
        .bind(change.status.as_str())
        .bind(&change.note)
        .bind(&change.actor)
        .bind(change.changed_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        timer.record();
        Ok(Some((entity.try_into()?, history.try_into()?)))
    }

    async fn update_payment(
        &self,
        id: i64,
        paid: bool,
        payment_proof: Option<String>,
    ) -> Result<Option<Registration>, RepositoryError> {
        let timer = QueryTimer::new("update_registration_payment");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            UPDATE registrations
            SET paid = $2, payment_proof = COALESCE($3, payment_proof)
            WHERE id = $1 AND NOT cancelled
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(paid)
        .bind(payment_proof)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(db_error)?
            .map(Registration::try_from)
            .transpose()
    }

    async fn cancel(&self, id: i64) -> Result<Option<Registration>, RepositoryError> {
        let timer = QueryTimer::new("cancel_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            UPDATE registrations
            SET cancelled = true
            WHERE id = $1 AND NOT cancelled
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(db_error)?
            .map(Registration::try_from)
            .transpose()
    }

    async fn list(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<RegistrationView>, RepositoryError> {
        let timer = QueryTimer::new("list_registrations");
        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT r.id, r.event_id, r.user_id, r.participant_name, r.email, r.affiliation,
                   r.payment_proof, r.paid, r.status, r.cancelled, r.created_at,
                   e.name AS event_name, e.registration_closes_at AS payment_deadline
            FROM registrations r
            JOIN events e ON e.id = r.event_id
            "#,
        );
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY r.created_at DESC, r.id DESC");

        let result = builder
            .build_query_as::<RegistrationViewEntity>()
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
            .map_err(db_error)?
            .into_iter()
            .map(RegistrationView::try_from)
            .collect()
    }

    async fn count_by_status(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<(RegistrationStatus, i64)>, RepositoryError> {
        let timer = QueryTimer::new("count_registrations_by_status");
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT r.status, COUNT(*) FROM registrations r JOIN events e ON e.id = r.event_id",
        );
        push_filter(&mut builder, filter);
        builder.push(" GROUP BY r.status");

        let result = builder
            .build_query_as::<(String, i64)>()
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
            .map_err(db_error)?
            .into_iter()
            .map(|(status, count)| {
                RegistrationStatus::parse(&status)
                    .map(|status| (status, count))
                    .ok_or_else(|| {
                        RepositoryError::Backend(format!(
                            "unknown registration status '{}'",
                            status
                        ))
                    })
            })
            .collect()
    }

    async fn history(&self, id: i64) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let timer = QueryTimer::new("registration_status_history");
        let result = sqlx::query_as::<_, StatusHistoryEntity>(&format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM registration_status_history
            WHERE registration_id = $1
            ORDER BY changed_at DESC, id DESC
            "#
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
            .map_err(db_error)?
            .into_iter()
            .map(StatusHistoryEntry::try_from)
            .collect()
    }

    async fn list_active_for_event(
        &self,
        event_id: i64,
    ) -> Result<Vec<Registration>, RepositoryError> {
        let timer = QueryTimer::new("list_active_registrations_for_event");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM registrations
            WHERE event_id = $1 AND NOT cancelled
            ORDER BY id ASC
            "#
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        into_registrations(result.map_err(db_error)?)
    }

    async fn list_awaiting_payment(&self) -> Result<Vec<Registration>, RepositoryError> {
        let timer = QueryTimer::new("list_registrations_awaiting_payment");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM registrations
            WHERE NOT cancelled AND NOT paid
            ORDER BY id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        into_registrations(result.map_err(db_error)?)
    }
}
