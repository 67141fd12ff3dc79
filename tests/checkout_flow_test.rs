//! Integration tests for the checkout flow.
//!
//! Covers the full orchestration: cart to order and payment intent, then the
//! three payment sheet outcomes (success, dismissal, failure) and their
//! reconciliation semantics.

mod common;

use common::TestApp;
use freshcart_api::{
    entities::{cart::CartStatus, checkout_session::CheckoutStatus, coupon::DiscountType, order::OrderStatus},
    errors::ServiceError,
    pagination::PageParams,
    services::{carts::{AddToCartInput, CreateCartInput}, checkout::StartCheckoutInput},
};
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn cart_with_items(app: &TestApp) -> Uuid {
    let cart = app
        .services
        .carts
        .create_cart(CreateCartInput {
            customer_id: Some(Uuid::new_v4()),
            currency: None,
        })
        .await
        .expect("create cart");

    let product = app.seed_product("Sourdough Loaf", dec!(8.50)).await;
    app.services
        .carts
        .add_item(
            cart.id,
            AddToCartInput {
                product_id: product.id,
                quantity: 2,
            },
        )
        .await
        .expect("add item");

    cart.id
}

fn start_input(cart_id: Uuid, coupon_code: Option<&str>) -> StartCheckoutInput {
    StartCheckoutInput {
        cart_id,
        customer_id: Uuid::new_v4(),
        coupon_code: coupon_code.map(String::from),
        customer_email: Some("shopper@example.com".into()),
        shipping_address: None,
    }
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn start_checkout_creates_order_and_intent() {
    let app = TestApp::new().await;
    let cart_id = cart_with_items(&app).await;

    let response = app
        .services
        .checkout
        .start_checkout(start_input(cart_id, None))
        .await
        .expect("start checkout");

    assert!(response.order_number.starts_with("ORD-"));
    assert!(response.payment_intent.client_secret.contains("secret"));

    let order = app
        .services
        .orders
        .get_order(response.order_id)
        .await
        .expect("order exists");
    assert_eq!(order.status, OrderStatus::Pending);
    // 2 x 8.50 = 17.00 subtotal, below the free-shipping threshold.
    assert_eq!(order.subtotal, dec!(17.00));
    assert_eq!(order.shipping_total, dec!(10));
    assert_eq!(order.total_amount, dec!(27.00));
    // GST extracted from the inclusive total: 27 * 10 / 110.
    assert_eq!(order.tax_amount, dec!(2.45));

    let session = app
        .services
        .checkout
        .get_session(response.session_id)
        .await
        .expect("session exists");
    assert_eq!(session.status, CheckoutStatus::AwaitingPayment);

    let cart = app
        .services
        .carts
        .get_cart_model(cart_id)
        .await
        .expect("cart exists");
    assert_eq!(cart.status, CartStatus::Converting);
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn completed_checkout_marks_order_paid_and_clears_cart() {
    let app = TestApp::new().await;
    let cart_id = cart_with_items(&app).await;
    let customer_id = Uuid::new_v4();

    let started = app
        .services
        .checkout
        .start_checkout(StartCheckoutInput {
            cart_id,
            customer_id,
            coupon_code: None,
            customer_email: Some("shopper@example.com".into()),
            shipping_address: None,
        })
        .await
        .expect("start checkout");

    let order_id = app
        .services
        .checkout
        .complete_checkout(started.session_id)
        .await
        .expect("complete checkout");
    assert_eq!(order_id, started.order_id);

    let order = app.services.orders.get_order(order_id).await.expect("order");
    assert_eq!(order.status, OrderStatus::Paid);

    let cart = app
        .services
        .carts
        .get_cart(cart_id)
        .await
        .expect("cart view");
    assert!(cart.items.is_empty());
    assert_eq!(cart.cart.status, CartStatus::Converted);

    // An order confirmation landed in the customer's feed.
    let feed = app
        .services
        .notifications
        .list_notifications(customer_id, PageParams::default())
        .await
        .expect("feed");
    assert_eq!(feed.total, 1);
    assert_eq!(
        feed.items[0].title,
        format!("Order {} confirmed", started.order_number)
    );

    // Re-reporting success is a no-op, not an error.
    let again = app
        .services
        .checkout
        .complete_checkout(started.session_id)
        .await
        .expect("idempotent complete");
    assert_eq!(again, order_id);

    // No second confirmation was queued.
    let feed = app
        .services
        .notifications
        .list_notifications(customer_id, PageParams::default())
        .await
        .expect("feed");
    assert_eq!(feed.total, 1);
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn cancelled_checkout_deletes_order_and_restores_cart() {
    let app = TestApp::new().await;
    let cart_id = cart_with_items(&app).await;

    let started = app
        .services
        .checkout
        .start_checkout(start_input(cart_id, None))
        .await
        .expect("start checkout");

    app.services
        .checkout
        .cancel_checkout(started.session_id)
        .await
        .expect("cancel checkout");

    // The order is gone and the intent was cancelled best-effort.
    let missing = app.services.orders.get_order(started.order_id).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    assert_eq!(app.gateway.cancel_count(), 1);

    // The cart is active again with its items untouched.
    let cart = app
        .services
        .carts
        .get_cart(cart_id)
        .await
        .expect("cart view");
    assert_eq!(cart.cart.status, CartStatus::Active);
    assert_eq!(cart.items.len(), 1);

    // A second cancel performs no second delete.
    app.services
        .checkout
        .cancel_checkout(started.session_id)
        .await
        .expect("idempotent cancel");
    assert_eq!(app.gateway.cancel_count(), 1);
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn failed_payment_leaves_order_for_reconciliation() {
    let app = TestApp::new().await;
    let cart_id = cart_with_items(&app).await;
    let customer_id = Uuid::new_v4();

    let started = app
        .services
        .checkout
        .start_checkout(StartCheckoutInput {
            cart_id,
            customer_id,
            coupon_code: None,
            customer_email: Some("shopper@example.com".into()),
            shipping_address: None,
        })
        .await
        .expect("start checkout");

    app.services
        .checkout
        .fail_checkout(started.session_id, Some("card declined".into()))
        .await
        .expect("fail checkout");

    let order = app
        .services
        .orders
        .get_order(started.order_id)
        .await
        .expect("order still exists");
    assert_eq!(order.status, OrderStatus::PaymentFailed);

    let session = app
        .services
        .checkout
        .get_session(started.session_id)
        .await
        .expect("session");
    assert_eq!(session.status, CheckoutStatus::Failed);

    // The customer was told the payment did not go through.
    let feed = app
        .services
        .notifications
        .list_notifications(customer_id, PageParams::default())
        .await
        .expect("feed");
    assert_eq!(feed.total, 1);
    assert!(feed.items[0].title.starts_with("Payment problem"));
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn gateway_failure_marks_session_failed_and_keeps_order() {
    let app = TestApp::new().await;
    let cart_id = cart_with_items(&app).await;

    app.gateway.failing_once();

    let result = app
        .services
        .checkout
        .start_checkout(start_input(cart_id, None))
        .await;
    assert!(matches!(result, Err(ServiceError::GatewayError(_))));
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn coupon_applied_at_checkout_reduces_total_and_tracks_usage() {
    let app = TestApp::new().await;
    let cart_id = cart_with_items(&app).await;
    app.seed_coupon("BREAD10", DiscountType::Percentage, dec!(10))
        .await;

    let started = app
        .services
        .checkout
        .start_checkout(start_input(cart_id, Some("BREAD10")))
        .await
        .expect("start checkout");

    let order = app
        .services
        .orders
        .get_order(started.order_id)
        .await
        .expect("order");
    // Subtotal 17.00, 10% off = 1.70, plus flat shipping 10.
    assert_eq!(order.discount_total, dec!(1.70));
    assert_eq!(order.total_amount, dec!(25.30));
    assert_eq!(order.coupon_code.as_deref(), Some("BREAD10"));

    app.services
        .checkout
        .complete_checkout(started.session_id)
        .await
        .expect("complete");

    // Usage tracked once on success.
    let rejected = app.services.coupons.validate("BREAD10", dec!(17)).await;
    assert!(rejected.is_ok(), "coupon still valid with no usage limit");
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn invalid_coupon_is_dropped_not_fatal() {
    let app = TestApp::new().await;
    let cart_id = cart_with_items(&app).await;

    let started = app
        .services
        .checkout
        .start_checkout(start_input(cart_id, Some("NO-SUCH-CODE")))
        .await
        .expect("checkout proceeds without the coupon");

    let order = app
        .services
        .orders
        .get_order(started.order_id)
        .await
        .expect("order");
    assert_eq!(order.discount_total, dec!(0));
    assert!(order.coupon_code.is_none());
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn expired_session_is_released_instead_of_completed() {
    use freshcart_api::entities::{checkout_session, CheckoutSession};
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    let app = TestApp::new().await;
    let cart_id = cart_with_items(&app).await;

    let started = app
        .services
        .checkout
        .start_checkout(start_input(cart_id, None))
        .await
        .expect("start checkout");

    // Backdate the reservation deadline past the TTL.
    let session = CheckoutSession::find_by_id(started.session_id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("session");
    let mut active: checkout_session::ActiveModel = session.into();
    active.expires_at = Set(chrono::Utc::now() - chrono::Duration::minutes(1));
    active.update(&*app.db).await.expect("backdate");

    let result = app
        .services
        .checkout
        .complete_checkout(started.session_id)
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidOperation(_))));

    // The reservation was released: order gone, cart restored.
    let missing = app.services.orders.get_order(started.order_id).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    let cart = app
        .services
        .carts
        .get_cart_model(cart_id)
        .await
        .expect("cart");
    assert_eq!(cart.status, CartStatus::Active);

    // The sweep finds nothing left to do.
    let released = app
        .services
        .checkout
        .release_expired()
        .await
        .expect("sweep");
    assert_eq!(released, 0);
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn empty_cart_cannot_start_checkout() {
    let app = TestApp::new().await;
    let cart = app
        .services
        .carts
        .create_cart(CreateCartInput {
            customer_id: None,
            currency: None,
        })
        .await
        .expect("create cart");

    let result = app
        .services
        .checkout
        .start_checkout(start_input(cart.id, None))
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidOperation(_))));
}
