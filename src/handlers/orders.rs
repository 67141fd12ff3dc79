use crate::handlers::common::{map_service_error, success_response};
use crate::{errors::ApiError, pagination::PageParams, AppState};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}", get(get_order))
        .route("/{id}/items", get(get_order_items))
        .route("/customer/{customer_id}", get(list_customer_orders))
}

/// Get an order
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Get an order's line items
async fn get_order_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let items = state
        .services
        .orders
        .get_order_items(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(items))
}

/// List a customer's orders, newest first
async fn list_customer_orders(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(customer_id, page.clamped())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}
