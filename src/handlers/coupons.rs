use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Creates the router for coupon endpoints
pub fn coupons_routes() -> Router<Arc<AppState>> {
    Router::new().route("/validate", post(validate_coupon))
}

#[derive(Debug, Deserialize, Validate)]
struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 50))]
    code: String,
    subtotal: Decimal,
}

/// Validate a coupon code against a subtotal and quote the discount
async fn validate_coupon(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let validated = state
        .services
        .coupons
        .validate(&payload.code, payload.subtotal)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(validated))
}
