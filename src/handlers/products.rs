use crate::handlers::common::{map_service_error, success_response};
use crate::{
    errors::ApiError, pagination::PageParams, services::products::ProductFilter, AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for product catalog endpoints
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
}

/// List active products with optional category and search filters
async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ProductFilter>,
    Query(page): Query<PageParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state
        .services
        .products
        .list_products(filter, page.clamped())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}

/// Get a product
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}
