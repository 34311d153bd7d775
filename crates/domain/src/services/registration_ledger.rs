//! Registration ledger: sign-ups, status transitions and their history.

use std::sync::Arc;

use shared::dates::parse_day;
use shared::Clock;
use tracing::info;
use validator::Validate;

use super::event_catalog::{is_registration_open, EventCatalog};
use super::notification::NotificationDispatcher;
use crate::error::{DomainError, RepositoryError};
use crate::models::registration::{
    CreateRegistrationRequest, RegistrationListQuery, StatusSummary,
};
use crate::models::{
    NewRegistration, Registration, RegistrationFilter, RegistrationStatus, RegistrationView,
    StatusChange, StatusHistoryEntry,
};
use crate::repositories::{RegistrationRepository, UserDirectory};

pub const INITIAL_NOTE: &str = "Confirmada";
pub const SYSTEM_ACTOR: &str = "system";

impl RegistrationFilter {
    /// Builds a filter from raw listing parameters.
    pub fn from_query(query: &RegistrationListQuery) -> Result<Self, DomainError> {
        let status = match query.estado.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(
                RegistrationStatus::parse(s)
                    .ok_or_else(|| DomainError::InvalidStatus(s.to_string()))?,
            ),
            _ => None,
        };
        let day = |value: &Option<String>, field: &str| match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => parse_day(v)
                .map(Some)
                .map_err(|_| DomainError::validation(format!("{} must use DD/MM/YYYY", field))),
            _ => Ok(None),
        };

        Ok(Self {
            user_id: query.id_usuario,
            event_id: query.id_evento,
            status,
            query: query.q.clone(),
            from: day(&query.desde, "desde")?,
            to: day(&query.hasta, "hasta")?,
        })
    }
}

pub struct RegistrationLedger {
    catalog: Arc<EventCatalog>,
    registrations: Arc<dyn RegistrationRepository>,
    users: Arc<dyn UserDirectory>,
    notifications: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl RegistrationLedger {
    pub fn new(
        catalog: Arc<EventCatalog>,
        registrations: Arc<dyn RegistrationRepository>,
        users: Arc<dyn UserDirectory>,
        notifications: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            registrations,
            users,
            notifications,
            clock,
        }
    }

    pub async fn create_registration(
        &self,
        request: &CreateRegistrationRequest,
    ) -> Result<Registration, DomainError> {
        request.validate()?;

        let event = self.catalog.get_event(request.event_id).await?;
        let now = self.clock.now();
        if !is_registration_open(&event, now) {
            return Err(DomainError::RegistrationClosed);
        }

        self.users
            .find_by_id(request.user_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        if self
            .registrations
            .find_active(event.id, request.user_id)
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyRegistered);
        }

        let registration = self
            .registrations
            .insert(
                NewRegistration {
                    event_id: event.id,
                    user_id: request.user_id,
                    participant_name: request.participant_name.trim().to_string(),
                    email: request.email.trim().to_string(),
                    affiliation: request.affiliation.trim().to_string(),
                    payment_proof: request
                        .payment_proof
                        .as_deref()
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string),
                    created_at: now,
                },
                StatusChange {
                    status: RegistrationStatus::Pending,
                    note: INITIAL_NOTE.to_string(),
                    actor: SYSTEM_ACTOR.to_string(),
                    changed_at: now,
                },
            )
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => DomainError::AlreadyRegistered,
                other => DomainError::Repository(other),
            })?;

        info!(
            registration_id = registration.id,
            event_id = event.id,
            user_id = registration.user_id,
            "Registration created"
        );

        self.notifications
            .registration_confirmed(&registration, &event)
            .await;
        Ok(registration)
    }

    /// Moves a registration to the status named by `status`.
    ///
    /// Any recognized status may follow any other.
    pub async fn update_status(
        &self,
        registration_id: i64,
        status: &str,
        note: Option<&str>,
        actor: Option<&str>,
    ) -> Result<(Registration, StatusHistoryEntry), DomainError> {
        let new_status = RegistrationStatus::parse(status)
            .ok_or_else(|| DomainError::InvalidStatus(status.trim().to_string()))?;
        let note = note.map(str::trim).unwrap_or_default().to_string();
        let actor = actor
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(SYSTEM_ACTOR)
            .to_string();

        let (registration, entry) = self
            .registrations
            .update_status(
                registration_id,
                StatusChange {
                    status: new_status,
                    note: note.clone(),
                    actor,
                    changed_at: self.clock.now(),
                },
            )
            .await?
            .ok_or(DomainError::RegistrationNotFound)?;

        info!(
            registration_id,
            previous = ?entry.previous_status,
            status = %new_status,
            "Registration status updated"
        );

        let event_name = match self.catalog.get_event(registration.event_id).await {
            Ok(event) => event.name,
            Err(_) => String::new(),
        };
        self.notifications
            .status_changed(&registration, &event_name, &note)
            .await;
        Ok((registration, entry))
    }

    pub async fn update_payment(
        &self,
        registration_id: i64,
        paid: bool,
        payment_proof: Option<&str>,
    ) -> Result<Registration, DomainError> {
        let proof = payment_proof
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let registration = self
            .registrations
            .update_payment(registration_id, paid, proof)
            .await?
            .ok_or(DomainError::RegistrationNotFound)?;

        info!(registration_id, paid, "Registration payment updated");
        Ok(registration)
    }

    /// Cancels a registration, freeing its (event, user) slot.
    pub async fn cancel_registration(&self, registration_id: i64) -> Result<Registration, DomainError> {
        let registration = self
            .registrations
            .cancel(registration_id)
            .await?
            .ok_or(DomainError::RegistrationNotFound)?;
        info!(registration_id, "Registration cancelled");
        Ok(registration)
    }

    pub async fn get_registration(&self, registration_id: i64) -> Result<Registration, DomainError> {
        self.registrations
            .find_by_id(registration_id)
            .await?
            .filter(|r| !r.cancelled)
            .ok_or(DomainError::RegistrationNotFound)
    }

    pub async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<RegistrationView>, DomainError> {
        Ok(self.registrations.list(filter).await?)
    }

    /// Status history, newest first.
    pub async fn history(&self, registration_id: i64) -> Result<Vec<StatusHistoryEntry>, DomainError> {
        self.registrations
            .find_by_id(registration_id)
            .await?
            .ok_or(DomainError::RegistrationNotFound)?;
        Ok(self.registrations.history(registration_id).await?)
    }

    pub async fn status_summary(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<StatusSummary, DomainError> {
        let counts = self.registrations.count_by_status(filter).await?;
        Ok(StatusSummary::from_counts(&counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::EventRequest;
    use crate::models::{NotificationKind, User};
    use crate::repositories::InMemoryStore;
    use crate::services::mail::NoopMailer;
    use crate::services::notification::NotificationService;
    use chrono::{DateTime, TimeZone, Utc};
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;
    use shared::FixedClock;

    fn at(d: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, m, d, 10, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        clock: Arc<FixedClock>,
        catalog: Arc<EventCatalog>,
        ledger: RegistrationLedger,
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
        let catalog = Arc::new(EventCatalog::new(
            store.clone(),
            notifications.clone(),
            clock.clone(),
        ));
        let ledger = RegistrationLedger::new(
            catalog.clone(),
            store.clone(),
            store.clone(),
            notifications,
            clock.clone(),
        );
        Fixture {
            store,
            clock,
            catalog,
            ledger,
        }
    }

    fn congreso() -> EventRequest {
        EventRequest {
            name: "Congreso de Software".into(),
            start: "10/03/2026".into(),
            end: "12/03/2026".into(),
            registration_close: "01/03/2026".into(),
            location: "Lima, Perú".into(),
        }
    }

    fn sign_up(event_id: i64, user: &User) -> CreateRegistrationRequest {
        CreateRegistrationRequest {
            event_id,
            user_id: user.id,
            participant_name: user.name.clone(),
            email: user.email.clone(),
            affiliation: "Universidad Nacional".into(),
            payment_proof: None,
        }
    }

    async fn random_user(store: &InMemoryStore) -> User {
        let name: String = Name().fake();
        let email: String = SafeEmail().fake();
        store.add_user(&name, &email).await
    }

    #[tokio::test]
    async fn test_scenario_register_and_pay() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let user = f.store.add_user("Ana Torres", "ana@example.com").await;

        f.clock.set(at(20, 2));
        let registration = f
            .ledger
            .create_registration(&sign_up(event.id, &user))
            .await
            .unwrap();
        assert_eq!(registration.status, RegistrationStatus::Pending);
        assert!(!registration.paid);

        let (updated, entry) = f
            .ledger
            .update_status(registration.id, "pagado", None, Some("tesoreria"))
            .await
            .unwrap();
        assert_eq!(updated.status, RegistrationStatus::Paid);
        assert_eq!(updated.status.as_str(), "Pagado");
        assert_eq!(entry.previous_status, Some(RegistrationStatus::Pending));
        assert_eq!(entry.new_status, RegistrationStatus::Paid);
        assert_eq!(entry.actor, "tesoreria");

        let history = f.ledger.history(registration.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], entry);
        assert_eq!(history[1].previous_status, None);
        assert_eq!(history[1].new_status, RegistrationStatus::Pending);
        assert_eq!(history[1].note, INITIAL_NOTE);
        assert_eq!(history[1].actor, SYSTEM_ACTOR);

        let kinds: Vec<NotificationKind> = f
            .store
            .all_notifications()
            .await
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::RegistrationConfirmed,
                NotificationKind::StatusChanged
            ]
        );
    }

    #[tokio::test]
    async fn test_second_registration_is_rejected() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let user = random_user(&f.store).await;

        f.ledger.create_registration(&sign_up(event.id, &user)).await.unwrap();
        let err = f
            .ledger
            .create_registration(&sign_up(event.id, &user))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::AlreadyRegistered);
        assert_eq!(f.store.all_registrations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_registration_frees_slot() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let user = random_user(&f.store).await;

        let first = f.ledger.create_registration(&sign_up(event.id, &user)).await.unwrap();
        f.ledger.cancel_registration(first.id).await.unwrap();
        assert!(f.ledger.create_registration(&sign_up(event.id, &user)).await.is_ok());
        assert_eq!(
            f.ledger.cancel_registration(first.id).await.unwrap_err(),
            DomainError::RegistrationNotFound
        );
    }

    #[tokio::test]
    async fn test_registration_window_gates_sign_up() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let user = random_user(&f.store).await;

        f.catalog.close_registration(event.id).await.unwrap();
        assert_eq!(
            f.ledger
                .create_registration(&sign_up(event.id, &user))
                .await
                .unwrap_err(),
            DomainError::RegistrationClosed
        );

        f.catalog.open_registration(event.id).await.unwrap();
        f.clock.set(at(1, 3));
        assert_eq!(
            f.ledger
                .create_registration(&sign_up(event.id, &user))
                .await
                .unwrap_err(),
            DomainError::RegistrationClosed
        );
    }

    #[tokio::test]
    async fn test_create_registration_lookups() {
        let f = fixture();
        let user = random_user(&f.store).await;
        assert_eq!(
            f.ledger.create_registration(&sign_up(404, &user)).await.unwrap_err(),
            DomainError::EventNotFound
        );

        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let ghost = User {
            id: 9_999,
            name: "Nadie Aqui".into(),
            email: "nadie@example.com".into(),
        };
        assert_eq!(
            f.ledger
                .create_registration(&sign_up(event.id, &ghost))
                .await
                .unwrap_err(),
            DomainError::UserNotFound
        );

        f.catalog.delete_event(event.id).await.unwrap();
        assert_eq!(
            f.ledger
                .create_registration(&sign_up(event.id, &user))
                .await
                .unwrap_err(),
            DomainError::EventNotFound
        );
    }

    #[tokio::test]
    async fn test_create_registration_validates_participant() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let user = random_user(&f.store).await;
        let mut request = sign_up(event.id, &user);
        request.email = "sin-arroba".into();
        assert!(matches!(
            f.ledger.create_registration(&request).await.unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(f.store.all_registrations().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_status_checked_before_lookup() {
        let f = fixture();
        assert_eq!(
            f.ledger.update_status(12345, "cancelado", None, None).await.unwrap_err(),
            DomainError::InvalidStatus("cancelado".into())
        );
        assert_eq!(
            f.ledger.update_status(12345, "Aprobado", None, None).await.unwrap_err(),
            DomainError::RegistrationNotFound
        );
    }

    #[tokio::test]
    async fn test_status_regression_is_allowed() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let user = random_user(&f.store).await;
        let registration = f.ledger.create_registration(&sign_up(event.id, &user)).await.unwrap();

        f.ledger.update_status(registration.id, "APROBADO", None, None).await.unwrap();
        let (back, entry) = f
            .ledger
            .update_status(registration.id, " pendiente ", Some("revisión"), None)
            .await
            .unwrap();
        assert_eq!(back.status, RegistrationStatus::Pending);
        assert_eq!(entry.previous_status, Some(RegistrationStatus::Approved));
        assert_eq!(entry.note, "revisión");
        assert_eq!(entry.actor, SYSTEM_ACTOR);
        assert_eq!(f.ledger.history(registration.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_payment_independent_of_status() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let user = random_user(&f.store).await;
        let registration = f.ledger.create_registration(&sign_up(event.id, &user)).await.unwrap();

        let paid = f
            .ledger
            .update_payment(registration.id, true, Some("voucher-001.pdf"))
            .await
            .unwrap();
        assert!(paid.paid);
        assert_eq!(paid.status, RegistrationStatus::Pending);
        assert_eq!(paid.payment_proof.as_deref(), Some("voucher-001.pdf"));
        assert_eq!(f.ledger.history(registration.id).await.unwrap().len(), 1);

        assert_eq!(
            f.ledger.update_payment(555, true, None).await.unwrap_err(),
            DomainError::RegistrationNotFound
        );
    }

    #[tokio::test]
    async fn test_list_filters_and_summary() {
        let f = fixture();
        let event = f.catalog.create_event(&congreso()).await.unwrap();
        let ana = f.store.add_user("Ana Torres", "ana@example.com").await;
        let luis = f.store.add_user("Luis Rojas", "luis@example.com").await;

        let first = f.ledger.create_registration(&sign_up(event.id, &ana)).await.unwrap();
        f.clock.set(at(16, 1));
        f.ledger.create_registration(&sign_up(event.id, &luis)).await.unwrap();
        f.ledger.update_status(first.id, "aprobado", None, None).await.unwrap();

        let all = f
            .ledger
            .list_registrations(&RegistrationFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].registration.user_id, luis.id);
        assert_eq!(all[0].event_name, "Congreso de Software");

        let query = RegistrationListQuery {
            estado: Some("Aprobado".into()),
            ..Default::default()
        };
        let approved = f
            .ledger
            .list_registrations(&RegistrationFilter::from_query(&query).unwrap())
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].registration.id, first.id);

        let query = RegistrationListQuery {
            q: Some("ROJAS".into()),
            desde: Some("16/01/2026".into()),
            hasta: Some("16/01/2026".into()),
            ..Default::default()
        };
        let found = f
            .ledger
            .list_registrations(&RegistrationFilter::from_query(&query).unwrap())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].registration.user_id, luis.id);

        let summary = f
            .ledger
            .status_summary(&RegistrationFilter::default())
            .await
            .unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_status["Aprobado"], 1);
        assert_eq!(summary.by_status["Pendiente"], 1);
    }

    #[tokio::test]
    async fn test_filter_from_query_rejects_bad_input() {
        let bad_status = RegistrationListQuery {
            estado: Some("borrado".into()),
            ..Default::default()
        };
        assert!(matches!(
            RegistrationFilter::from_query(&bad_status).unwrap_err(),
            DomainError::InvalidStatus(_)
        ));

        let bad_date = RegistrationListQuery {
            desde: Some("2026-01-01".into()),
            ..Default::default()
        };
        assert!(matches!(
            RegistrationFilter::from_query(&bad_date).unwrap_err(),
            DomainError::Validation(_)
        ));

        let blank = RegistrationListQuery {
            estado: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(
            RegistrationFilter::from_query(&blank).unwrap(),
            RegistrationFilter::default()
        );
    }
}
