//! Inbox and notification preference handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::notification::{MarkReadRequest, NotificationResponse};
use domain::models::user::{PreferencesResponse, UpdatePreferencesRequest};

/// GET /api/v1/users/:id/notifications
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let notifications = state.services.notifications.list_for_user(user_id).await?;
    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

/// PATCH /api/v1/notifications/:id
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let notification = state
        .services
        .notifications
        .mark_read(id, request.read)
        .await?;
    Ok(Json(notification.into()))
}

/// GET /api/v1/users/:id/notification-preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<PreferencesResponse>, ApiError> {
    let preferences = state.services.notifications.preferences(user_id).await?;
    Ok(Json(preferences.into()))
}

/// PUT /api/v1/users/:id/notification-preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<UpdatePreferencesRequest>,
) -> Result<Json<PreferencesResponse>, ApiError> {
    request.validate()?;

    let preferences = state
        .services
        .notifications
        .update_preferences(user_id, &request.frequency, &request.kinds, request.enabled)
        .await?;
    Ok(Json(preferences.into()))
}
