//! Query latency histograms and pool gauges for the Postgres repositories.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

const QUERY_DURATION: &str = "database_query_duration_seconds";

/// Connection counts read from the pool at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub total: u32,
    pub idle: u32,
}

impl PoolSnapshot {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            total: pool.size(),
            idle: pool.num_idle() as u32,
        }
    }

    /// Connections checked out by a repository call.
    pub fn in_use(&self) -> u32 {
        self.total.saturating_sub(self.idle)
    }

    fn publish(&self) {
        gauge!("database_connections_active").set(self.in_use() as f64);
        gauge!("database_connections_idle").set(self.idle as f64);
        gauge!("database_connections_total").set(self.total as f64);
    }
}

/// Publishes the pool gauges. Driven by the `pool_metrics` job.
pub fn record_pool_metrics(pool: &PgPool) {
    PoolSnapshot::of(pool).publish();
}

/// Times one repository query. Every query name is a literal such as
/// `"insert_registration"`, so it doubles as the histogram label.
pub struct QueryTimer {
    query: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        histogram!(QUERY_DURATION, "query" => self.query).record(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_use_counts_checked_out_connections() {
        let snapshot = PoolSnapshot { total: 10, idle: 7 };
        assert_eq!(snapshot.in_use(), 3);
    }

    #[test]
    fn test_in_use_never_underflows() {
        // The pool reads size and idle separately, so idle can briefly lead.
        let snapshot = PoolSnapshot { total: 2, idle: 3 };
        assert_eq!(snapshot.in_use(), 0);
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        QueryTimer::new("insert_event").record();
        PoolSnapshot { total: 1, idle: 1 }.publish();
    }
}
