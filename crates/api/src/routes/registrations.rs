//! Registration ledger endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::registration::{
    CreateRegistrationRequest, RegistrationFilter, RegistrationListQuery, RegistrationResponse,
    StatusHistoryResponse, StatusSummary, UpdatePaymentRequest, UpdateStatusRequest,
};

/// Register a participant for an event.
///
/// POST /api/v1/registrations
pub async fn create_registration(
    State(state): State<AppState>,
    Json(request): Json<CreateRegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), ApiError> {
    let registration = state.services.ledger.create_registration(&request).await?;

    Ok((StatusCode::CREATED, Json(registration.into())))
}

/// List active registrations.
///
/// GET /api/v1/registrations?id_usuario&id_evento&estado&q&desde&hasta
pub async fn list_registrations(
    State(state): State<AppState>,
    Query(query): Query<RegistrationListQuery>,
) -> Result<Json<Vec<RegistrationResponse>>, ApiError> {
    let filter = RegistrationFilter::from_query(&query)?;
    let views = state.services.ledger.list_registrations(&filter).await?;
    Ok(Json(views.into_iter().map(RegistrationResponse::from).collect()))
}

/// Registration counts per status for the same filters as the listing.
///
/// GET /api/v1/registrations/summary
pub async fn status_summary(
    State(state): State<AppState>,
    Query(query): Query<RegistrationListQuery>,
) -> Result<Json<StatusSummary>, ApiError> {
    let filter = RegistrationFilter::from_query(&query)?;
    Ok(Json(state.services.ledger.status_summary(&filter).await?))
}

/// GET /api/v1/registrations/:id
pub async fn get_registration(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let registration = state.services.ledger.get_registration(id).await?;
    Ok(Json(registration.into()))
}

/// PATCH /api/v1/registrations/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let (registration, _) = state
        .services
        .ledger
        .update_status(
            id,
            &request.status,
            request.note.as_deref(),
            request.actor.as_deref(),
        )
        .await?;

    Ok(Json(registration.into()))
}

/// PATCH /api/v1/registrations/:id/payment
pub async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let registration = state
        .services
        .ledger
        .update_payment(id, request.paid, request.payment_proof.as_deref())
        .await?;
    Ok(Json(registration.into()))
}

/// Cancel a registration, freeing the slot.
///
/// DELETE /api/v1/registrations/:id
pub async fn cancel_registration(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.ledger.cancel_registration(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/registrations/:id/history
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StatusHistoryResponse>>, ApiError> {
    let entries = state.services.ledger.history(id).await?;
    Ok(Json(
        entries.into_iter().map(StatusHistoryResponse::from).collect(),
    ))
}
