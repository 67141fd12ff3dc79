//! FreshCart storefront API
//!
//! Backend for a grocery storefront: carts, coupons, checkout with a hosted
//! payment sheet, order history, saved addresses, reviews, and the
//! notification feed.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod pagination;
pub mod payments;
pub mod services;

use axum::{routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub services: services::AppServices,
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// All v1 API routes, nested under `/api/v1` by the binary.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/carts", handlers::carts::carts_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/coupons", handlers::coupons::coupons_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest(
            "/products",
            handlers::products::products_routes().merge(handlers::reviews::reviews_routes()),
        )
        .nest(
            "/customers",
            handlers::addresses::addresses_routes()
                .merge(handlers::notifications::notifications_routes()),
        )
}
