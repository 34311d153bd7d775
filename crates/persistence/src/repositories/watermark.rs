//! Scheduler watermark repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domain::repositories::WatermarkStore;
use domain::RepositoryError;

use crate::error::db_error;
use crate::metrics::QueryTimer;

/// Stores the last successful run of each background job.
#[derive(Clone)]
pub struct PgWatermarkStore {
    pool: PgPool,
}

impl PgWatermarkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatermarkStore for PgWatermarkStore {
    async fn get(&self, job: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let timer = QueryTimer::new("get_job_watermark");
        let result: Result<Option<(DateTime<Utc>,)>, sqlx::Error> =
            sqlx::query_as("SELECT last_run FROM job_watermarks WHERE job_name = $1")
                .bind(job)
                .fetch_optional(&self.pool)
                .await;
        timer.record();
        Ok(result.map_err(db_error)?.map(|(last_run,)| last_run))
    }

    async fn put(&self, job: &str, ran_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let timer = QueryTimer::new("put_job_watermark");
        let result = sqlx::query(
            r#"
            INSERT INTO job_watermarks (job_name, last_run, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (job_name) DO UPDATE SET
                last_run = EXCLUDED.last_run,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(job)
        .bind(ran_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map_err(db_error)?;
        Ok(())
    }
}
