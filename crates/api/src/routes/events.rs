//! Event catalog endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::event::{
    EventActionQuery, EventRequest, EventResponse, OccupiedRange, RegistrationWindowAction,
};

/// Create a new event.
///
/// POST /api/v1/events
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<EventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    let catalog = &state.services.catalog;
    let event = catalog.create_event(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(EventResponse::from_event(&event, catalog.now())),
    ))
}

/// List active events.
///
/// GET /api/v1/events
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let catalog = &state.services.catalog;
    let now = catalog.now();
    let events = catalog.list_events().await?;
    Ok(Json(
        events
            .iter()
            .map(|event| EventResponse::from_event(event, now))
            .collect(),
    ))
}

/// Date windows already taken by active events.
///
/// GET /api/v1/events/occupied-dates
pub async fn occupied_dates(
    State(state): State<AppState>,
) -> Result<Json<Vec<OccupiedRange>>, ApiError> {
    Ok(Json(state.services.catalog.occupied_ranges().await?))
}

/// GET /api/v1/events/:id
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<EventResponse>, ApiError> {
    let catalog = &state.services.catalog;
    let event = catalog.get_event(id).await?;
    Ok(Json(EventResponse::from_event(&event, catalog.now())))
}

/// PUT /api/v1/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<EventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    let catalog = &state.services.catalog;
    let event = catalog.update_event(id, &request).await?;

    Ok(Json(EventResponse::from_event(&event, catalog.now())))
}

/// Close or reopen the registration window.
///
/// PATCH /api/v1/events/:id?action=cerrar|abrir
pub async fn apply_window_action(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<EventActionQuery>,
) -> Result<Json<EventResponse>, ApiError> {
    let action = RegistrationWindowAction::parse(&query.action).ok_or_else(|| {
        ApiError::Validation(format!(
            "Unknown action '{}', expected 'cerrar' or 'abrir'",
            query.action
        ))
    })?;

    let catalog = &state.services.catalog;
    let event = catalog.apply_window_action(id, action).await?;

    Ok(Json(EventResponse::from_event(&event, catalog.now())))
}

/// Cancel an event.
///
/// DELETE /api/v1/events/:id
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.catalog.delete_event(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
