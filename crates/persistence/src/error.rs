//! Mapping from sqlx errors to repository errors.

use domain::RepositoryError;

/// PostgreSQL `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Converts a driver error, reporting unique-constraint violations as conflicts.
pub fn db_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            RepositoryError::Conflict(
                db.constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db.message().to_string()),
            )
        }
        _ => {
            tracing::error!(error = %err, "Database error");
            RepositoryError::Backend(err.to_string())
        }
    }
}
