//! Notification scheduler: timed notification rules with catch-up.
//!
//! The scheduler does not own a timer. Something outside calls
//! [`NotificationScheduler::tick`] periodically (and once at start); each tick
//! compares the persisted watermark with the scheduled hour and runs a pass
//! when one is due.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use shared::Clock;
use tracing::{debug, error, info, warn};

use super::notification::{messages, Delivery, NotificationService};
use crate::error::{DomainError, RepositoryError};
use crate::models::{Event, NewNotification, NotificationKind, User};
use crate::repositories::{
    EventRepository, RegistrationRepository, UserDirectory, WatermarkStore,
};

/// Days ahead of an event's start within which unpaid registrants are reminded.
pub const PAYMENT_DUE_WINDOW_DAYS: i64 = 5;

/// The most recent scheduled instant at or before `now`.
///
/// That is today at `run_hour` once that hour has been reached, otherwise
/// yesterday at `run_hour`.
pub fn due_at(now: DateTime<Utc>, run_hour: u32) -> DateTime<Utc> {
    let hour = NaiveTime::from_hms_opt(run_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(hour));
    if now >= today {
        today
    } else {
        today - Duration::days(1)
    }
}

/// Whether a pass is owed: no run yet, or the last run precedes the most
/// recent scheduled instant.
pub fn should_run(last_run: Option<DateTime<Utc>>, now: DateTime<Utc>, run_hour: u32) -> bool {
    last_run.map_or(true, |last| last < due_at(now, run_hour))
}

/// Outcome of one rule within a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Notifications stored by this pass.
    pub emitted: usize,
    /// Targets whose dedup key was already taken.
    pub duplicates: usize,
    /// Targets skipped because of a per-target failure.
    pub failed_targets: usize,
    /// Set when the rule could not run at all.
    pub error: Option<String>,
}

impl RuleOutcome {
    fn failed(error: RepositoryError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    fn record(&mut self, result: Result<Delivery, RepositoryError>) {
        match result {
            Ok(Delivery::Sent) => self.emitted += 1,
            Ok(Delivery::Duplicate) => self.duplicates += 1,
            Err(_) => self.failed_targets += 1,
        }
    }
}

/// Outcome of a full pass over the timed rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub closing_soon: RuleOutcome,
    pub event_reminder: RuleOutcome,
    pub payment_due: RuleOutcome,
}

impl PassReport {
    /// A pass succeeds when every rule ran, even if some targets failed.
    pub fn succeeded(&self) -> bool {
        self.rules().iter().all(|(_, r)| r.error.is_none())
    }

    pub fn rules(&self) -> [(NotificationKind, &RuleOutcome); 3] {
        [
            (NotificationKind::ClosingSoon, &self.closing_soon),
            (NotificationKind::EventReminder, &self.event_reminder),
            (NotificationKind::PaymentDue, &self.payment_due),
        ]
    }

    pub fn emitted(&self) -> usize {
        self.rules().iter().map(|(_, r)| r.emitted).sum()
    }
}

/// Result of a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The watermark is current; nothing ran.
    NotDue,
    /// A pass ran and the watermark advanced.
    Completed(PassReport),
    /// A pass ran with rule failures; the watermark was left for a retry.
    Incomplete(PassReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub job_name: String,
    /// UTC hour of the daily scheduled pass.
    pub run_hour: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            job_name: "notification_pass".to_string(),
            run_hour: 8,
        }
    }
}

pub struct NotificationScheduler {
    events: Arc<dyn EventRepository>,
    registrations: Arc<dyn RegistrationRepository>,
    users: Arc<dyn UserDirectory>,
    watermarks: Arc<dyn WatermarkStore>,
    notifications: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
}

impl NotificationScheduler {
    pub fn new(
        events: Arc<dyn EventRepository>,
        registrations: Arc<dyn RegistrationRepository>,
        users: Arc<dyn UserDirectory>,
        watermarks: Arc<dyn WatermarkStore>,
        notifications: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            events,
            registrations,
            users,
            watermarks,
            notifications,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Runs a pass if one is owed and advances the watermark after success.
    pub async fn tick(&self) -> Result<TickOutcome, DomainError> {
        let now = self.clock.now();
        let last_run = self.watermarks.get(&self.settings.job_name).await?;
        if !should_run(last_run, now, self.settings.run_hour) {
            debug!(job = %self.settings.job_name, ?last_run, "Notification pass not due");
            return Ok(TickOutcome::NotDue);
        }

        info!(job = %self.settings.job_name, ?last_run, "Running notification pass");
        let report = self.run_pass(now).await;

        if report.succeeded() {
            self.watermarks.put(&self.settings.job_name, now).await?;
            info!(
                job = %self.settings.job_name,
                emitted = report.emitted(),
                "Notification pass completed"
            );
            Ok(TickOutcome::Completed(report))
        } else {
            warn!(
                job = %self.settings.job_name,
                emitted = report.emitted(),
                "Notification pass incomplete, watermark left for retry"
            );
            Ok(TickOutcome::Incomplete(report))
        }
    }

    /// Runs every timed rule once. Rules do not stop each other.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> PassReport {
        PassReport {
            closing_soon: self.closing_soon(now).await,
            event_reminder: self.event_reminder(now).await,
            payment_due: self.payment_due(now).await,
        }
    }

    /// Reminds users who have not signed up that registration closes tomorrow.
    pub async fn closing_soon(&self, now: DateTime<Utc>) -> RuleOutcome {
        let today = now.date_naive();
        let found = self.events.find_closing_on(tomorrow(today)).await;
        let events = match self.events_for(found, "closing_soon") {
            Ok(events) => events,
            Err(outcome) => return outcome,
        };
        let users = match self.users.list_all().await {
            Ok(users) => users,
            Err(e) => {
                error!(rule = "closing_soon", error = %e, "Failed to list users");
                return RuleOutcome::failed(e);
            }
        };

        let mut outcome = RuleOutcome::default();
        for event in &events {
            let registered: HashSet<i64> = match self
                .registrations
                .list_active_for_event(event.id)
                .await
            {
                Ok(registrations) => registrations.iter().map(|r| r.user_id).collect(),
                Err(e) => {
                    warn!(
                        rule = "closing_soon",
                        event_id = event.id,
                        error = %e,
                        "Failed to list registrations, skipping event"
                    );
                    outcome.failed_targets += 1;
                    continue;
                }
            };

            let message = messages::closing_soon(event);
            for user in users.iter().filter(|u| !registered.contains(&u.id)) {
                let result = self
                    .deliver(user, event, NotificationKind::ClosingSoon, &message, now)
                    .await;
                outcome.record(result);
            }
        }
        outcome
    }

    /// Reminds registrants that their event starts tomorrow.
    pub async fn event_reminder(&self, now: DateTime<Utc>) -> RuleOutcome {
        let today = now.date_naive();
        let found = self.events.find_starting_on(tomorrow(today)).await;
        let events = match self.events_for(found, "event_reminder") {
            Ok(events) => events,
            Err(outcome) => return outcome,
        };

        let mut outcome = RuleOutcome::default();
        let mut users: HashMap<i64, Option<User>> = HashMap::new();
        for event in &events {
            let registrations = match self.registrations.list_active_for_event(event.id).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        rule = "event_reminder",
                        event_id = event.id,
                        error = %e,
                        "Failed to list registrations, skipping event"
                    );
                    outcome.failed_targets += 1;
                    continue;
                }
            };

            let message = messages::event_reminder(event);
            for registration in &registrations {
                let user = match self.cached_user(&mut users, registration.user_id).await {
                    Ok(Some(user)) => user,
                    Ok(None) => continue,
                    Err(_) => {
                        outcome.failed_targets += 1;
                        continue;
                    }
                };
                let result = self
                    .deliver(&user, event, NotificationKind::EventReminder, &message, now)
                    .await;
                outcome.record(result);
            }
        }
        outcome
    }

    /// Reminds unpaid registrants whose event starts within the next
    /// [`PAYMENT_DUE_WINDOW_DAYS`] days.
    pub async fn payment_due(&self, now: DateTime<Utc>) -> RuleOutcome {
        let registrations = match self.registrations.list_awaiting_payment().await {
            Ok(r) => r,
            Err(e) => {
                error!(rule = "payment_due", error = %e, "Failed to list unpaid registrations");
                return RuleOutcome::failed(e);
            }
        };

        let horizon = now + Duration::days(PAYMENT_DUE_WINDOW_DAYS);
        let mut outcome = RuleOutcome::default();
        let mut events: HashMap<i64, Option<Event>> = HashMap::new();
        let mut users: HashMap<i64, Option<User>> = HashMap::new();

        for registration in &registrations {
            let event = match events.get(&registration.event_id) {
                Some(cached) => cached.clone(),
                None => match self.events.find_by_id(registration.event_id).await {
                    Ok(found) => {
                        events.insert(registration.event_id, found.clone());
                        found
                    }
                    Err(e) => {
                        warn!(rule = "payment_due", event_id = registration.event_id, error = %e, "Failed to load event");
                        outcome.failed_targets += 1;
                        continue;
                    }
                },
            };
            let Some(event) = event.filter(|e| !e.cancelled) else {
                continue;
            };
            if event.starts_at < now || event.starts_at > horizon {
                continue;
            }

            let user = match self.cached_user(&mut users, registration.user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => continue,
                Err(_) => {
                    outcome.failed_targets += 1;
                    continue;
                }
            };
            let message = messages::payment_due(&event);
            let notification =
                NewNotification::for_event(user.id, event.id, NotificationKind::PaymentDue, message, now)
                    .with_registration(registration.id);
            let result = self.deliver_notification(&user, notification, now).await;
            outcome.record(result);
        }
        outcome
    }

    fn events_for(
        &self,
        result: Result<Vec<Event>, RepositoryError>,
        rule: &'static str,
    ) -> Result<Vec<Event>, RuleOutcome> {
        result.map_err(|e| {
            error!(rule, error = %e, "Failed to list events");
            RuleOutcome::failed(e)
        })
    }

    async fn cached_user(
        &self,
        cache: &mut HashMap<i64, Option<User>>,
        user_id: i64,
    ) -> Result<Option<User>, RepositoryError> {
        if let Some(cached) = cache.get(&user_id) {
            return Ok(cached.clone());
        }
        match self.users.find_by_id(user_id).await {
            Ok(found) => {
                cache.insert(user_id, found.clone());
                Ok(found)
            }
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load user");
                Err(e)
            }
        }
    }

    async fn deliver(
        &self,
        user: &User,
        event: &Event,
        kind: NotificationKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Delivery, RepositoryError> {
        let notification = NewNotification::for_event(user.id, event.id, kind, message.to_string(), now);
        self.deliver_notification(user, notification, now).await
    }

    async fn deliver_notification(
        &self,
        user: &User,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Delivery, RepositoryError> {
        let kind = notification.kind;
        let event_id = notification.event_id;
        self.notifications
            .deliver_once(user, notification, now.date_naive())
            .await
            .inspect_err(|e| {
                warn!(user_id = user.id, ?event_id, kind = %kind, error = %e, "Failed to store notification");
            })
    }
}

fn tomorrow(today: NaiveDate) -> NaiveDate {
    today.succ_opt().unwrap_or(today)
}
