//! Background job driving the daily notification pass.

use std::sync::Arc;

use domain::services::{NotificationScheduler, TickOutcome};
use tracing::{info, warn};

use super::scheduler::{Job, JobFrequency};
use crate::middleware::metrics::{record_notification_tick, record_notification_tick_error};

/// Wakes the notification scheduler on a fixed poll interval.
///
/// The scheduler itself decides from its watermark whether a pass is owed,
/// so a restart after a missed run catches up on the first poll.
pub struct NotificationPassJob {
    scheduler: Arc<NotificationScheduler>,
    poll_interval_secs: u64,
}

impl NotificationPassJob {
    pub fn new(scheduler: Arc<NotificationScheduler>, poll_interval_secs: u64) -> Self {
        Self {
            scheduler,
            poll_interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for NotificationPassJob {
    fn name(&self) -> &'static str {
        "notification_pass"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.poll_interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let outcome = self.scheduler.tick().await.map_err(|e| {
            record_notification_tick_error();
            format!("Notification tick failed: {}", e)
        })?;

        record_notification_tick(&outcome);

        match &outcome {
            TickOutcome::NotDue => {}
            TickOutcome::Completed(report) => info!(
                emitted = report.emitted(),
                "Notification pass completed"
            ),
            TickOutcome::Incomplete(report) => warn!(
                emitted = report.emitted(),
                "Notification pass incomplete, will retry on next poll"
            ),
        }
        Ok(())
    }
}
