use crate::handlers::common::{map_service_error, success_response};
use crate::{errors::ApiError, services::checkout::StartCheckoutInput, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start", post(start_checkout))
        .route("/{session_id}/complete", post(complete_checkout))
        .route("/{session_id}/cancel", post(cancel_checkout))
        .route("/{session_id}/fail", post(fail_checkout))
}

/// Start a checkout: create the order and payment intent for the hosted
/// payment sheet
async fn start_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartCheckoutInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let response = state
        .services
        .checkout
        .start_checkout(payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(response))
}

#[derive(Debug, Serialize)]
struct CompleteCheckoutResponse {
    order_id: Uuid,
}

/// Report a successful payment sheet result
async fn complete_checkout(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order_id = state
        .services
        .checkout
        .complete_checkout(session_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CompleteCheckoutResponse { order_id }))
}

/// Report a dismissed payment sheet; deletes the pending order
async fn cancel_checkout(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .checkout
        .cancel_checkout(session_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({ "cancelled": true })))
}

#[derive(Debug, Default, Deserialize)]
struct FailCheckoutRequest {
    reason: Option<String>,
}

/// Report a failed payment
async fn fail_checkout(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    payload: Option<Json<FailCheckoutRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let reason = payload.and_then(|Json(p)| p.reason);

    state
        .services
        .checkout
        .fail_checkout(session_id, reason)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({ "failed": true })))
}
