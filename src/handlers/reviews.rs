use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{
    errors::ApiError, pagination::PageParams, services::reviews::SubmitReviewInput, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for product review endpoints, nested per product
pub fn reviews_routes() -> Router<Arc<AppState>> {
    // First segment shares the `{id}` name with the product routes this
    // router is merged with.
    Router::new()
        .route("/{id}/reviews", get(list_reviews))
        .route("/{id}/reviews", post(submit_review))
        .route("/{id}/reviews/summary", get(review_summary))
}

/// List a product's reviews, newest first
async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let reviews = state
        .services
        .reviews
        .list_reviews(product_id, page.clamped())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(reviews))
}

/// Submit or replace a review for a product
async fn submit_review(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<SubmitReviewInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let review = state
        .services
        .reviews
        .submit_review(product_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(review))
}

#[derive(Debug, Serialize)]
struct ReviewSummary {
    average_rating: Option<f64>,
}

/// Average rating for a product
async fn review_summary(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let average_rating = state
        .services
        .reviews
        .average_rating(product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ReviewSummary { average_rating }))
}
