//! Event catalog: event records, their date rules and the registration window.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::dates::{parse_date, start_of_day};
use shared::Clock;
use tracing::info;
use validator::Validate;

use super::notification::NotificationDispatcher;
use crate::error::DomainError;
use crate::models::event::{EventRequest, OccupiedRange, RegistrationWindowAction};
use crate::models::{Event, EventDraft};
use crate::repositories::EventRepository;

/// Whether sign-ups for `event` are accepted at `now`.
///
/// Every component that gates on the registration window goes through this.
pub fn is_registration_open(event: &Event, now: DateTime<Utc>) -> bool {
    event.is_registration_open(now)
}

/// Rejects `draft` if its name or window collides with an active event
/// other than `exclude`.
pub fn check_catalog(
    active: &[Event],
    draft: &EventDraft,
    exclude: Option<i64>,
) -> Result<(), DomainError> {
    let others = active
        .iter()
        .filter(|e| !e.cancelled && Some(e.id) != exclude);

    for event in others {
        if event.has_name(&draft.name) {
            return Err(DomainError::NameExists(draft.name.clone()));
        }
        if event.overlaps(draft.starts_at, draft.ends_at) {
            return Err(DomainError::Overlap(event.name.clone()));
        }
    }
    Ok(())
}

fn parse_field(value: &str, field: &str) -> Result<DateTime<Utc>, DomainError> {
    parse_date(value).map_err(|_| {
        DomainError::validation(format!(
            "{} must use DD/MM/YYYY or DD/MM/YYYY HH:MM:SS",
            field
        ))
    })
}

fn parse_request(request: &EventRequest) -> Result<EventDraft, DomainError> {
    request.validate()?;
    Ok(EventDraft {
        name: request.name.trim().to_string(),
        starts_at: parse_field(&request.start, "fecha_inicio")?,
        ends_at: parse_field(&request.end, "fecha_fin")?,
        registration_closes_at: parse_field(&request.registration_close, "fecha_cierre_inscripcion")?,
        location: request.location.trim().to_string(),
    })
}

fn check_window_order(draft: &EventDraft) -> Result<(), DomainError> {
    if draft.ends_at < draft.starts_at {
        return Err(DomainError::validation(
            "End date must not be before the start date",
        ));
    }
    if draft.registration_closes_at >= draft.starts_at {
        return Err(DomainError::validation(
            "Registration must close before the event starts",
        ));
    }
    Ok(())
}

pub struct EventCatalog {
    events: Arc<dyn EventRepository>,
    notifications: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl EventCatalog {
    pub fn new(
        events: Arc<dyn EventRepository>,
        notifications: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            notifications,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_event(&self, request: &EventRequest) -> Result<Event, DomainError> {
        let draft = parse_request(request)?;
        let now = self.clock.now();
        let today = start_of_day(now);

        if draft.starts_at <= today {
            return Err(DomainError::validation("Start date must be after today"));
        }
        if draft.registration_closes_at <= today {
            return Err(DomainError::validation(
                "Registration close date must be after today",
            ));
        }
        check_window_order(&draft)?;

        let candidate = draft.clone();
        let guard = move |active: &[Event]| check_catalog(active, &candidate, None);
        let event = self.events.insert_guarded(draft, now, &guard).await?;

        info!(event_id = event.id, name = %event.name, "Event created");
        Ok(event)
    }

    pub async fn update_event(&self, id: i64, request: &EventRequest) -> Result<Event, DomainError> {
        let current = self.get_event(id).await?;
        let mut draft = parse_request(request)?;
        let now = self.clock.now();
        let today = start_of_day(now);

        let current_close_day = current.registration_closes_at.date_naive();
        let requested_close_day = draft.registration_closes_at.date_naive();
        let close_changed = requested_close_day != current_close_day;
        let close_locked = now.date_naive() > current_close_day;

        if draft.starts_at <= today {
            return Err(DomainError::validation("Start date must be after today"));
        }
        if close_changed && close_locked {
            return Err(DomainError::CloseDateLocked);
        }
        if close_locked {
            // Same day once locked: the stored instant is kept.
            draft.registration_closes_at = current.registration_closes_at;
        }
        if close_changed && draft.registration_closes_at <= today {
            return Err(DomainError::validation(
                "Registration close date must be after today",
            ));
        }
        check_window_order(&draft)?;

        let candidate = draft.clone();
        let guard = move |active: &[Event]| check_catalog(active, &candidate, Some(id));
        let event = self
            .events
            .update_guarded(id, draft, now, &guard)
            .await?
            .ok_or(DomainError::EventNotFound)?;

        info!(event_id = event.id, "Event updated");
        Ok(event)
    }

    pub async fn close_registration(&self, id: i64) -> Result<Event, DomainError> {
        self.set_window(id, false).await
    }

    pub async fn open_registration(&self, id: i64) -> Result<Event, DomainError> {
        self.set_window(id, true).await
    }

    /// Applies a close/open sub-action.
    pub async fn apply_window_action(
        &self,
        id: i64,
        action: RegistrationWindowAction,
    ) -> Result<Event, DomainError> {
        match action {
            RegistrationWindowAction::Close => self.close_registration(id).await,
            RegistrationWindowAction::Open => self.open_registration(id).await,
        }
    }

    async fn set_window(&self, id: i64, open: bool) -> Result<Event, DomainError> {
        let current = self.get_event(id).await?;
        let now = self.clock.now();
        if now >= current.starts_at {
            return Err(DomainError::CannotModifyAfterStart);
        }

        let event = self
            .events
            .set_manual_open(id, open, now)
            .await?
            .ok_or(DomainError::EventNotFound)?;
        info!(event_id = id, open, "Registration window updated");

        if open && !current.manual_open {
            self.notifications.registration_reopened(&event).await;
        }
        Ok(event)
    }

    /// Cancels an event. Its registrations stay as they are.
    pub async fn delete_event(&self, id: i64) -> Result<Event, DomainError> {
        let event = self
            .events
            .cancel(id, self.clock.now())
            .await?
            .ok_or(DomainError::EventNotFound)?;
        info!(event_id = id, "Event cancelled");

        self.notifications.event_cancelled(&event).await;
        Ok(event)
    }

    /// An active event by id.
    pub async fn get_event(&self, id: i64) -> Result<Event, DomainError> {
        self.events
            .find_by_id(id)
            .await?
            .filter(|e| !e.cancelled)
            .ok_or(DomainError::EventNotFound)
    }

    pub async fn list_events(&self) -> Result<Vec<Event>, DomainError> {
        Ok(self.events.list_active().await?)
    }

    /// Date windows taken by active events.
    pub async fn occupied_ranges(&self) -> Result<Vec<OccupiedRange>, DomainError> {
        let events = self.events.list_active().await?;
        Ok(events.iter().map(OccupiedRange::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;
    use crate::repositories::InMemoryStore;
    use crate::services::mail::NoopMailer;
    use crate::services::notification::NotificationService;
    use chrono::{Duration, TimeZone};
    use shared::FixedClock;

    fn at(d: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, m, d, 10, 0, 0).unwrap()
    }

    fn request(name: &str, start: &str, end: &str, close: &str) -> EventRequest {
        EventRequest {
            name: name.into(),
            start: start.into(),
            end: end.into(),
            registration_close: close.into(),
            location: "Lima, Perú".into(),
        }
    }

    fn congreso() -> EventRequest {
        request("Congreso de Software", "10/03/2026", "12/03/2026", "01/03/2026")
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        clock: Arc<FixedClock>,
        catalog: EventCatalog,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(at(15, 1)));
        let notifications = Arc::new(NotificationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(NoopMailer),
            clock.clone(),
        ));
        let catalog = EventCatalog::new(store.clone(), notifications, clock.clone());
        Fixture {
            store,
            clock,
            catalog,
        }
    }

    #[tokio::test]
    async fn test_create_event_defaults_open() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        assert!(event.manual_open);
        assert!(!event.cancelled);
        assert_eq!(event.name, "Congreso de Software");
        assert_eq!(event.starts_at, Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap());
        assert!(is_registration_open(&event, f.catalog.now()));
    }

    #[tokio::test]
    async fn test_create_event_accepts_time_of_day() {
        let f = fixture();
        let event = f
            .catalog
            .create_event(&request(
                "Jornada de Datos",
                "10/03/2026 09:00:00",
                "10/03/2026 18:00:00",
                "01/03/2026 23:59:59",
            ))
            .await
            .unwrap();
        assert_eq!(event.ends_at, Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_create_event_rejects_overlap() {
        let f = fixture();
        f.catalog.create_event(&congreso()).await.unwrap();

        let err = f
            .catalog
            .create_event(&request("Foro de Innovación", "11/03/2026", "13/03/2026", "01/03/2026"))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::Overlap("Congreso de Software".into()));
    }

    #[tokio::test]
    async fn test_create_event_touching_bounds_overlap() {
        let f = fixture();
        f.catalog.create_event(&congreso()).await.unwrap();
        let err = f
            .catalog
            .create_event(&request("Foro de Innovación", "12/03/2026", "14/03/2026", "01/03/2026"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Overlap(_)));

        assert!(f
            .catalog
            .create_event(&request("Foro de Innovación", "13/03/2026", "14/03/2026", "01/03/2026"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_create_event_rejects_duplicate_name() {
        let f = fixture();
        f.catalog.create_event(&congreso()).await.unwrap();
        let err = f
            .catalog
            .create_event(&request("congreso de software", "10/04/2026", "12/04/2026", "01/04/2026"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NameExists(_)));
    }

    #[tokio::test]
    async fn test_cancelled_event_frees_name_and_window() {
        let f = fixture();
        let first = f.catalog.create_event(&congreso()).await.unwrap();
        f.catalog.delete_event(first.id).await.unwrap();
        assert!(f.catalog.create_event(&congreso()).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_event_date_rules() {
        let f = fixture();
        let cases = [
            ("15/01/2026", "16/01/2026", "14/01/2026"),
            ("10/03/2026", "12/03/2026", "15/01/2026"),
            ("10/03/2026", "09/03/2026", "01/03/2026"),
            ("10/03/2026", "12/03/2026", "10/03/2026"),
            ("10/03/2026", "12/03/2026", "2026-03-01"),
        ];
        for (start, end, close) in cases {
            let err = f
                .catalog
                .create_event(&request("Congreso de Software", start, end, close))
                .await
                .unwrap_err();
            assert!(
                matches!(err, DomainError::Validation(_)),
                "expected validation error for {start} {end} {close}, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_create_event_single_day_is_valid() {
        let f = fixture();
        assert!(f
            .catalog
            .create_event(&request("Taller de Rust", "10/03/2026", "10/03/2026", "01/03/2026"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_create_event_rejects_bad_text() {
        let f = fixture();
        let mut bad_name = congreso();
        bad_name.name = "Conf 2026".into();
        assert!(matches!(
            f.catalog.create_event(&bad_name).await.unwrap_err(),
            DomainError::Validation(_)
        ));

        let mut bad_location = congreso();
        bad_location.location = "Lima".into();
        assert!(matches!(
            f.catalog.create_event(&bad_location).await.unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_update_excludes_own_window() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let updated = f
            .catalog
            .update_event(
                event.id,
                &request("Congreso de Software", "11/03/2026", "13/03/2026", "01/03/2026"),
            )
            .await
            .unwrap();
        assert_eq!(updated.ends_at, Utc.with_ymd_and_hms(2026, 3, 13, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_update_rejects_overlap_with_other_event() {
        let f = fixture();
        f.catalog.create_event(&congreso()).await.unwrap();
        let other = f
            .catalog
            .create_event(&request("Foro de Innovación", "20/03/2026", "22/03/2026", "01/03/2026"))
            .await
            .unwrap();

        let err = f
            .catalog
            .update_event(
                other.id,
                &request("Foro de Innovación", "12/03/2026", "14/03/2026", "01/03/2026"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Overlap(_)));
    }

    #[tokio::test]
    async fn test_close_date_lock() {
        let f = fixture();
        let event = f
            .catalog
            .create_event(&request("Congreso de Software", "10/03/2026", "12/03/2026", "05/02/2026"))
            .await
            .unwrap();

        f.clock.set(Utc.with_ymd_and_hms(2026, 2, 6, 9, 0, 0).unwrap());

        let err = f
            .catalog
            .update_event(
                event.id,
                &request("Congreso de Software", "10/03/2026", "12/03/2026", "08/03/2026"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::CloseDateLocked);

        let same = f
            .catalog
            .update_event(
                event.id,
                &request("Congreso de Software", "10/03/2026", "13/03/2026", "05/02/2026"),
            )
            .await
            .unwrap();
        assert_eq!(same.registration_closes_at, event.registration_closes_at);
        assert_eq!(same.ends_at, Utc.with_ymd_and_hms(2026, 3, 13, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_locked_close_date_keeps_stored_time() {
        let f = fixture();
        let event = f
            .catalog
            .create_event(&request("Congreso de Software", "10/03/2026", "12/03/2026", "05/02/2026"))
            .await
            .unwrap();

        f.clock.set(Utc.with_ymd_and_hms(2026, 2, 6, 9, 0, 0).unwrap());
        let updated = f
            .catalog
            .update_event(
                event.id,
                &request("Congreso de Software", "10/03/2026", "12/03/2026", "05/02/2026 23:00:00"),
            )
            .await
            .unwrap();
        assert_eq!(updated.registration_closes_at, event.registration_closes_at);
        assert_eq!(
            updated.registration_closes_at,
            Utc.with_ymd_and_hms(2026, 2, 5, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_close_date_editable_before_lock() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let updated = f
            .catalog
            .update_event(
                event.id,
                &request("Congreso de Software", "10/03/2026", "12/03/2026", "05/03/2026"),
            )
            .await
            .unwrap();
        assert_eq!(updated.registration_closes_at.date_naive().to_string(), "2026-03-05");
    }

    #[tokio::test]
    async fn test_update_unknown_or_cancelled_event() {
        let f = fixture();
        assert_eq!(
            f.catalog.update_event(77, &congreso()).await.unwrap_err(),
            DomainError::EventNotFound
        );

        let event = f.catalog.create_event(&congreso()).await.unwrap();
        f.catalog.delete_event(event.id).await.unwrap();
        assert_eq!(
            f.catalog.update_event(event.id, &congreso()).await.unwrap_err(),
            DomainError::EventNotFound
        );
        assert_eq!(
            f.catalog.delete_event(event.id).await.unwrap_err(),
            DomainError::EventNotFound
        );
    }

    #[tokio::test]
    async fn test_close_and_reopen_window() {
        let f = fixture();
        f.store.add_user("Ana Torres", "ana@example.com").await;
        let event = f.catalog.create_event(&congreso()).await.unwrap();

        let closed = f.catalog.close_registration(event.id).await.unwrap();
        assert!(!closed.manual_open);
        assert!(!is_registration_open(&closed, f.catalog.now()));

        let reopened = f.catalog.open_registration(event.id).await.unwrap();
        assert!(reopened.manual_open);
        assert!(is_registration_open(&reopened, f.catalog.now()));

        let notices = f.store.all_notifications().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NotificationKind::RegistrationReopened);
    }

    #[tokio::test]
    async fn test_open_already_open_does_not_notify() {
        let f = fixture();
        f.store.add_user("Ana Torres", "ana@example.com").await;
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        f.catalog.open_registration(event.id).await.unwrap();
        assert!(f.store.all_notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_window_locked_after_start() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        f.clock.set(event.starts_at);
        assert_eq!(
            f.catalog.close_registration(event.id).await.unwrap_err(),
            DomainError::CannotModifyAfterStart
        );
        f.clock.advance(Duration::days(1));
        assert_eq!(
            f.catalog
                .apply_window_action(event.id, RegistrationWindowAction::Open)
                .await
                .unwrap_err(),
            DomainError::CannotModifyAfterStart
        );
    }

    #[tokio::test]
    async fn test_list_and_occupied_ranges_skip_cancelled() {
        let f = fixture();
        let first = f.catalog.create_event(&congreso()).await.unwrap();
        f.catalog
            .create_event(&request("Foro de Innovación", "20/03/2026", "22/03/2026", "01/03/2026"))
            .await
            .unwrap();
        f.catalog.delete_event(first.id).await.unwrap();

        let events = f.catalog.list_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Foro de Innovación");

        let ranges = f.catalog.occupied_ranges().await.unwrap();
        assert_eq!(
            ranges,
            vec![OccupiedRange {
                start: "20/03/2026".into(),
                end: "22/03/2026".into(),
            }]
        );
        assert_eq!(
            f.catalog.get_event(first.id).await.unwrap_err(),
            DomainError::EventNotFound
        );
    }

    #[tokio::test]
    async fn test_no_overlap_invariant_after_mixed_writes() {
        let f = fixture();
        let windows = [
            ("02/03/2026", "04/03/2026"),
            ("03/03/2026", "06/03/2026"),
            ("05/03/2026", "07/03/2026"),
            ("08/03/2026", "08/03/2026"),
            ("01/03/2026", "20/03/2026"),
            ("21/03/2026", "25/03/2026"),
        ];
        let names = [
            "Evento Alfa",
            "Evento Beta",
            "Evento Gamma",
            "Evento Delta",
            "Evento Epsilon",
            "Evento Zeta",
        ];
        let mut ids = Vec::new();
        for ((start, end), name) in windows.iter().zip(names) {
            if let Ok(e) = f
                .catalog
                .create_event(&request(name, start, end, "20/02/2026"))
                .await
            {
                ids.push(e.id);
            }
        }
        for id in &ids {
            let _ = f
                .catalog
                .update_event(*id, &request("Evento Movido", "06/03/2026", "09/03/2026", "20/02/2026"))
                .await;
        }

        let events = f.catalog.list_events().await.unwrap();
        for a in &events {
            for b in &events {
                if a.id != b.id {
                    assert!(!a.overlaps(b.starts_at, b.ends_at), "{} overlaps {}", a.name, b.name);
                }
            }
        }
    }
}
