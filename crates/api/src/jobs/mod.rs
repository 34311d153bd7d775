//! Background job scheduler and job implementations.

mod notification_pass;
mod pool_metrics;
mod scheduler;

pub use notification_pass::NotificationPassJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
