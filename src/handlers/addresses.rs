use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response,
};
use crate::{
    errors::ApiError, pagination::PageParams, services::addresses::SaveAddressInput, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for saved address endpoints, nested per customer
pub fn addresses_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{customer_id}/addresses", get(list_addresses))
        .route("/{customer_id}/addresses", post(create_address))
        .route("/{customer_id}/addresses/{address_id}", put(update_address))
        .route(
            "/{customer_id}/addresses/{address_id}",
            delete(delete_address),
        )
        .route(
            "/{customer_id}/addresses/{address_id}/default",
            post(set_default_address),
        )
}

/// List a customer's addresses, default first
async fn list_addresses(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let addresses = state
        .services
        .addresses
        .list_addresses(customer_id, page.clamped())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(addresses))
}

/// Save a new address
async fn create_address(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<SaveAddressInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let address = state
        .services
        .addresses
        .create_address(customer_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(address))
}

/// Update an address
async fn update_address(
    State(state): State<Arc<AppState>>,
    Path((customer_id, address_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SaveAddressInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let address = state
        .services
        .addresses
        .update_address(customer_id, address_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(address))
}

/// Delete an address
async fn delete_address(
    State(state): State<Arc<AppState>>,
    Path((customer_id, address_id)): Path<(Uuid, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .addresses
        .delete_address(customer_id, address_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Make an address the customer's default
async fn set_default_address(
    State(state): State<Arc<AppState>>,
    Path((customer_id, address_id)): Path<(Uuid, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let address = state
        .services
        .addresses
        .set_default(customer_id, address_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(address))
}
