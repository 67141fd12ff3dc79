use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    errors::ApiError,
    pagination::PageParams,
    services::notifications::{RegisterDeviceInput, UpdatePreferencesInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for notification endpoints, nested per customer
pub fn notifications_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{customer_id}/notifications", get(list_notifications))
        .route(
            "/{customer_id}/notifications/unread-count",
            get(unread_count),
        )
        .route(
            "/{customer_id}/notifications/{notification_id}/read",
            post(mark_read),
        )
        .route("/{customer_id}/preferences", get(get_preferences))
        .route("/{customer_id}/preferences", put(update_preferences))
        .route("/{customer_id}/device", post(register_device))
}

/// List a customer's notifications, newest first
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let notifications = state
        .services
        .notifications
        .list_notifications(customer_id, page.clamped())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(notifications))
}

#[derive(Debug, Serialize)]
struct UnreadCount {
    unread: u64,
}

/// Unread notification count for the badge
async fn unread_count(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let unread = state
        .services
        .notifications
        .unread_count(customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(UnreadCount { unread }))
}

/// Mark a notification as read
async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path((customer_id, notification_id)): Path<(Uuid, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let notification = state
        .services
        .notifications
        .mark_read(customer_id, notification_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(notification))
}

/// Get notification preferences
async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let prefs = state
        .services
        .notifications
        .get_preferences(customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(prefs))
}

/// Update notification preference flags
async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<UpdatePreferencesInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let prefs = state
        .services
        .notifications
        .update_preferences(customer_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(prefs))
}

/// Register the device push token
async fn register_device(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<RegisterDeviceInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let prefs = state
        .services
        .notifications
        .register_device(customer_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(prefs))
}
