//! Registration domain model and status history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::dates::{format_date, format_date_time};
use validator::Validate;

/// Payment/approval status of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegistrationStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "Pagado")]
    Paid,
    #[serde(rename = "Aprobado")]
    Approved,
    #[serde(rename = "Rechazado")]
    Rejected,
}

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 4] = [
        RegistrationStatus::Pending,
        RegistrationStatus::Paid,
        RegistrationStatus::Approved,
        RegistrationStatus::Rejected,
    ];

    /// Converts to database and wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "Pendiente",
            RegistrationStatus::Paid => "Pagado",
            RegistrationStatus::Approved => "Aprobado",
            RegistrationStatus::Rejected => "Rechazado",
        }
    }

    /// Parses free-form status text, ignoring case and surrounding whitespace.
    ///
    /// Both the Spanish wire names and their English equivalents are
    /// recognized.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "pendiente" | "pending" => Some(RegistrationStatus::Pending),
            "pagado" | "paid" => Some(RegistrationStatus::Paid),
            "aprobado" | "approved" => Some(RegistrationStatus::Approved),
            "rechazado" | "rejected" => Some(RegistrationStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's enrollment in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub participant_name: String,
    pub email: String,
    pub affiliation: String,
    pub payment_proof: Option<String>,
    pub paid: bool,
    pub status: RegistrationStatus,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    /// Still owes payment: active and not marked paid, whatever its status.
    pub fn is_awaiting_payment(&self) -> bool {
        !self.cancelled && !self.paid
    }
}

/// Registration joined with the fields of its event that listings show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationView {
    pub registration: Registration,
    pub event_name: String,
    pub payment_deadline: DateTime<Utc>,
}

/// Values for inserting a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub event_id: i64,
    pub user_id: i64,
    pub participant_name: String,
    pub email: String,
    pub affiliation: String,
    pub payment_proof: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One append-only row of a registration's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub registration_id: i64,
    pub previous_status: Option<RegistrationStatus>,
    pub new_status: RegistrationStatus,
    pub note: String,
    pub actor: String,
    pub changed_at: DateTime<Utc>,
}

/// Values for appending a history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: RegistrationStatus,
    pub note: String,
    pub actor: String,
    pub changed_at: DateTime<Utc>,
}

/// Filter over active registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFilter {
    pub user_id: Option<i64>,
    pub event_id: Option<i64>,
    pub status: Option<RegistrationStatus>,
    /// Case-insensitive substring of participant name, email or event name.
    pub query: Option<String>,
    /// Inclusive lower bound on the inscription day.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the inscription day.
    pub to: Option<NaiveDate>,
}

impl RegistrationFilter {
    pub fn matches(&self, view: &RegistrationView) -> bool {
        let r = &view.registration;
        if r.cancelled {
            return false;
        }
        if self.user_id.is_some_and(|id| id != r.user_id) {
            return false;
        }
        if self.event_id.is_some_and(|id| id != r.event_id) {
            return false;
        }
        if self.status.is_some_and(|status| status != r.status) {
            return false;
        }
        let day = r.created_at.date_naive();
        if self.from.is_some_and(|from| day < from) {
            return false;
        }
        if self.to.is_some_and(|to| day > to) {
            return false;
        }
        if let Some(query) = self.normalized_query() {
            let hit = [&r.participant_name, &r.email, &view.event_name]
                .iter()
                .any(|field| field.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }
        true
    }

    /// Lower-cased search text, or `None` when absent or blank.
    pub fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

/// Request payload for registering a participant.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRegistrationRequest {
    #[serde(rename = "id_evento")]
    pub event_id: i64,

    #[serde(rename = "id_usuario")]
    pub user_id: i64,

    #[serde(rename = "nombre_participante")]
    #[validate(custom(function = "shared::validation::validate_participant_name"))]
    pub participant_name: String,

    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,

    #[serde(rename = "afiliacion")]
    #[validate(custom(function = "shared::validation::validate_affiliation"))]
    pub affiliation: String,

    #[serde(rename = "comprobante_pago", default)]
    pub payment_proof: Option<String>,
}

/// Request payload for a status transition.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(rename = "estado")]
    pub status: String,
    #[serde(rename = "nota", default)]
    pub note: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Request payload for a payment update.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentRequest {
    #[serde(rename = "pagado")]
    pub paid: bool,
    #[serde(rename = "comprobante_pago", default)]
    pub payment_proof: Option<String>,
}

/// Query parameters for registration listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationListQuery {
    pub id_usuario: Option<i64>,
    pub id_evento: Option<i64>,
    pub estado: Option<String>,
    pub q: Option<String>,
    pub desde: Option<String>,
    pub hasta: Option<String>,
}

/// Response payload for registration operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationResponse {
    #[serde(rename = "id_inscripcion")]
    pub id: i64,
    #[serde(rename = "id_evento")]
    pub event_id: i64,
    #[serde(rename = "id_usuario")]
    pub user_id: i64,
    #[serde(rename = "nombre_participante")]
    pub participant_name: String,
    pub email: String,
    #[serde(rename = "afiliacion")]
    pub affiliation: String,
    #[serde(rename = "comprobante_pago", skip_serializing_if = "Option::is_none")]
    pub payment_proof: Option<String>,
    #[serde(rename = "pagado")]
    pub paid: bool,
    #[serde(rename = "estado")]
    pub status: RegistrationStatus,
    #[serde(rename = "fecha_inscripcion")]
    pub created_at: String,
    #[serde(rename = "evento_nombre", skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(rename = "fecha_limite_pago", skip_serializing_if = "Option::is_none")]
    pub payment_deadline: Option<String>,
}

impl From<Registration> for RegistrationResponse {
    fn from(r: Registration) -> Self {
        Self {
            id: r.id,
            event_id: r.event_id,
            user_id: r.user_id,
            participant_name: r.participant_name,
            email: r.email,
            affiliation: r.affiliation,
            payment_proof: r.payment_proof,
            paid: r.paid,
            status: r.status,
            created_at: format_date(r.created_at),
            event_name: None,
            payment_deadline: None,
        }
    }
}

impl From<RegistrationView> for RegistrationResponse {
    fn from(view: RegistrationView) -> Self {
        let deadline = format_date(view.payment_deadline);
        Self {
            event_name: Some(view.event_name),
            payment_deadline: Some(deadline),
            ..RegistrationResponse::from(view.registration)
        }
    }
}

/// Response payload for one history row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusHistoryResponse {
    #[serde(rename = "id_historial")]
    pub id: i64,
    #[serde(rename = "estado_anterior")]
    pub previous_status: Option<RegistrationStatus>,
    #[serde(rename = "estado_nuevo")]
    pub new_status: RegistrationStatus,
    #[serde(rename = "nota")]
    pub note: String,
    pub actor: String,
    #[serde(rename = "fecha_cambio")]
    pub changed_at: String,
}

impl From<StatusHistoryEntry> for StatusHistoryResponse {
    fn from(h: StatusHistoryEntry) -> Self {
        Self {
            id: h.id,
            previous_status: h.previous_status,
            new_status: h.new_status,
            note: h.note,
            actor: h.actor,
            changed_at: format_date_time(h.changed_at),
        }
    }
}

/// Registration counts per status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub total: i64,
    #[serde(rename = "por_estado")]
    pub by_status: std::collections::BTreeMap<String, i64>,
}

impl StatusSummary {
    /// Builds a summary with every status present, zero when absent.
    pub fn from_counts(counts: &[(RegistrationStatus, i64)]) -> Self {
        let mut by_status: std::collections::BTreeMap<String, i64> = RegistrationStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in counts {
            *by_status.entry(status.as_str().to_string()).or_insert(0) += count;
        }
        Self {
            total: counts.iter().map(|(_, c)| c).sum(),
            by_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_view() -> RegistrationView {
        RegistrationView {
            registration: Registration {
                id: 7,
                event_id: 1,
                user_id: 3,
                participant_name: "Ana Torres".into(),
                email: "ana@example.com".into(),
                affiliation: "UNI".into(),
                payment_proof: None,
                paid: false,
                status: RegistrationStatus::Pending,
                cancelled: false,
                created_at: Utc.with_ymd_and_hms(2026, 2, 10, 15, 0, 0).unwrap(),
            },
            event_name: "Congreso de Software".into(),
            payment_deadline: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_status_parse_normalizes() {
        assert_eq!(RegistrationStatus::parse("pagado"), Some(RegistrationStatus::Paid));
        assert_eq!(RegistrationStatus::parse("  APROBADO "), Some(RegistrationStatus::Approved));
        assert_eq!(RegistrationStatus::parse("Rejected"), Some(RegistrationStatus::Rejected));
        assert_eq!(RegistrationStatus::parse("cancelado"), None);
        assert_eq!(RegistrationStatus::parse(""), None);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&RegistrationStatus::Pending).unwrap();
        assert_eq!(json, "\"Pendiente\"");
        let parsed: RegistrationStatus = serde_json::from_str("\"Pagado\"").unwrap();
        assert_eq!(parsed, RegistrationStatus::Paid);
        assert_eq!(RegistrationStatus::Approved.to_string(), "Aprobado");
    }

    #[test]
    fn test_awaiting_payment() {
        let mut r = sample_view().registration;
        assert!(r.is_awaiting_payment());
        r.paid = true;
        assert!(!r.is_awaiting_payment());
        r.paid = false;
        r.status = RegistrationStatus::Approved;
        assert!(r.is_awaiting_payment());
        r.cancelled = true;
        assert!(!r.is_awaiting_payment());
    }

    #[test]
    fn test_filter_matches_query_across_fields() {
        let view = sample_view();
        let by_name = RegistrationFilter {
            query: Some("torres".into()),
            ..Default::default()
        };
        let by_event = RegistrationFilter {
            query: Some("SOFTWARE".into()),
            ..Default::default()
        };
        let miss = RegistrationFilter {
            query: Some("hardware".into()),
            ..Default::default()
        };
        assert!(by_name.matches(&view));
        assert!(by_event.matches(&view));
        assert!(!miss.matches(&view));
    }

    #[test]
    fn test_filter_date_range_is_inclusive() {
        let view = sample_view();
        let day = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let same_day = RegistrationFilter {
            from: Some(day),
            to: Some(day),
            ..Default::default()
        };
        assert!(same_day.matches(&view));

        let after = RegistrationFilter {
            from: day.succ_opt(),
            ..Default::default()
        };
        assert!(!after.matches(&view));
    }

    #[test]
    fn test_filter_excludes_cancelled() {
        let mut view = sample_view();
        view.registration.cancelled = true;
        assert!(!RegistrationFilter::default().matches(&view));
    }

    #[test]
    fn test_filter_by_ids_and_status() {
        let view = sample_view();
        let filter = RegistrationFilter {
            user_id: Some(3),
            event_id: Some(1),
            status: Some(RegistrationStatus::Pending),
            ..Default::default()
        };
        assert!(filter.matches(&view));
        let other_user = RegistrationFilter {
            user_id: Some(4),
            ..Default::default()
        };
        assert!(!other_user.matches(&view));
    }

    #[test]
    fn test_create_request_validation() {
        let request: CreateRegistrationRequest = serde_json::from_value(serde_json::json!({
            "id_evento": 1,
            "id_usuario": 3,
            "nombre_participante": "Ana Torres",
            "email": "ana@example.com",
            "afiliacion": "UNI"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert!(request.payment_proof.is_none());

        let bad_email = CreateRegistrationRequest {
            email: "not-an-email".into(),
            ..request.clone()
        };
        assert!(bad_email.validate().is_err());

        let short_name = CreateRegistrationRequest {
            participant_name: "Al".into(),
            ..request
        };
        assert!(short_name.validate().is_err());
    }

    #[test]
    fn test_view_response_carries_event_fields() {
        let response = RegistrationResponse::from(sample_view());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["estado"], "Pendiente");
        assert_eq!(json["evento_nombre"], "Congreso de Software");
        assert_eq!(json["fecha_limite_pago"], "01/03/2026");
        assert_eq!(json["fecha_inscripcion"], "10/02/2026");
        assert!(json.get("comprobante_pago").is_none());
    }

    #[test]
    fn test_status_summary_fills_missing_statuses() {
        let summary = StatusSummary::from_counts(&[
            (RegistrationStatus::Pending, 2),
            (RegistrationStatus::Paid, 1),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_status["Pendiente"], 2);
        assert_eq!(summary.by_status["Rechazado"], 0);
        assert_eq!(summary.by_status.len(), 4);
    }
}
