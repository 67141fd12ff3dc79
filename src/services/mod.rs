pub mod addresses;
pub mod carts;
pub mod checkout;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;

use crate::{config::AppConfig, events::EventSender, payments::PaymentGateway};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All service instances, wired once at startup and shared through the
/// application state.
#[derive(Clone)]
pub struct AppServices {
    pub carts: Arc<carts::CartService>,
    pub coupons: Arc<coupons::CouponService>,
    pub orders: Arc<orders::OrderService>,
    pub checkout: Arc<checkout::CheckoutService>,
    pub products: Arc<products::ProductService>,
    pub addresses: Arc<addresses::AddressService>,
    pub reviews: Arc<reviews::ReviewService>,
    pub notifications: Arc<notifications::NotificationService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        let carts = Arc::new(carts::CartService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let coupons = Arc::new(coupons::CouponService::new(db.clone()));
        let orders = Arc::new(orders::OrderService::new(db.clone(), event_sender.clone()));
        let notifications = Arc::new(notifications::NotificationService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(checkout::CheckoutService::new(
            db.clone(),
            event_sender,
            gateway,
            carts.clone(),
            coupons.clone(),
            orders.clone(),
            notifications.clone(),
            config,
        ));
        let products = Arc::new(products::ProductService::new(db.clone()));
        let addresses = Arc::new(addresses::AddressService::new(db.clone()));
        let reviews = Arc::new(reviews::ReviewService::new(db));

        Self {
            carts,
            coupons,
            orders,
            checkout,
            products,
            addresses,
            reviews,
            notifications,
        }
    }
}
