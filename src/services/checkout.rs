use crate::{
    config::AppConfig,
    entities::{
        cart::CartStatus,
        checkout_session::{self, CheckoutStatus},
        order::{self, OrderStatus},
        order_item, CheckoutSession, Order,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{to_minor_units, CreateIntentRequest, PaymentGateway, PaymentIntent},
    services::{
        carts::{shipping_for, CartService, CartWithItems},
        coupons::{CouponService, ValidatedCoupon},
        notifications::{NotificationKind, NotificationService},
        orders::{order_number_for, OrderService},
    },
};
use chrono::{Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Payment orchestrator.
///
/// Sequences the checkout flow against the backend order store and the hosted
/// payment provider:
///
/// ```text
/// pending -> awaiting_payment -> { completed | cancelled | failed }
/// ```
///
/// `start_checkout` creates the order and payment intent; the mobile client
/// then presents the hosted payment sheet and reports the outcome through
/// `complete_checkout`, `cancel_checkout`, or `fail_checkout`. Cancel is the
/// only path with a compensating action (one order delete); other failures
/// leave the order behind for manual reconciliation.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Arc<dyn PaymentGateway>,
    cart_service: Arc<CartService>,
    coupon_service: Arc<CouponService>,
    order_service: Arc<OrderService>,
    notification_service: Arc<NotificationService>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        cart_service: Arc<CartService>,
        coupon_service: Arc<CouponService>,
        order_service: Arc<OrderService>,
        notification_service: Arc<NotificationService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            cart_service,
            coupon_service,
            order_service,
            notification_service,
            config,
        }
    }

    /// Builds the ephemeral order draft from live cart state, revalidating
    /// the coupon against the current subtotal. A coupon that no longer
    /// validates is dropped with a warning so the customer is never charged a
    /// stale discount.
    async fn build_draft(
        &self,
        cart: &CartWithItems,
        coupon_code: Option<&str>,
    ) -> Result<OrderDraft, ServiceError> {
        let subtotal: Decimal = cart.items.iter().map(|item| item.line_total).sum();

        let coupon = match coupon_code {
            Some(code) => match self.coupon_service.validate(code, subtotal).await {
                Ok(validated) => Some(validated),
                Err(ServiceError::CouponRejected(reason)) => {
                    warn!(code = %code, reason = %reason, "Dropping coupon at checkout");
                    None
                }
                Err(other) => return Err(other),
            },
            None => None,
        };

        let discount_amount = coupon
            .as_ref()
            .map(|c| c.discount_amount)
            .unwrap_or(Decimal::ZERO);

        let shipping_total = shipping_for(
            subtotal,
            self.config.shipping_flat_rate,
            self.config.free_shipping_threshold,
        );
        let total_amount = subtotal - discount_amount + shipping_total;
        let tax_amount = gst_portion(total_amount, self.config.gst_rate);

        Ok(OrderDraft {
            subtotal,
            discount_amount,
            coupon,
            shipping_total,
            tax_amount,
            total_amount,
        })
    }

    /// Starts a checkout: creates the order from the cart, requests a payment
    /// intent, and hands the client secret back for the hosted payment sheet.
    ///
    /// Order creation is transactional; a failure there has no side effects.
    /// A gateway failure after the order is committed leaves the order in
    /// place (no cleanup is performed by this step) and marks the session
    /// failed.
    #[instrument(skip(self, input), fields(cart_id = %input.cart_id))]
    pub async fn start_checkout(
        &self,
        input: StartCheckoutInput,
    ) -> Result<StartCheckoutResponse, ServiceError> {
        input.validate()?;

        let cart = self.cart_service.get_cart(input.cart_id).await?;

        if cart.cart.status != CartStatus::Active {
            return Err(ServiceError::InvalidOperation(
                "Cart is not active".to_string(),
            ));
        }
        if cart.items.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let draft = self.build_draft(&cart, input.coupon_code.as_deref()).await?;

        let order_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let order_number = order_number_for(order_id);
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            customer_id: Set(input.customer_id),
            status: Set(OrderStatus::Pending),
            subtotal: Set(draft.subtotal),
            discount_total: Set(draft.discount_amount),
            shipping_total: Set(draft.shipping_total),
            tax_amount: Set(draft.tax_amount),
            total_amount: Set(draft.total_amount),
            currency: Set(cart.cart.currency.clone()),
            coupon_code: Set(draft.coupon.as_ref().map(|c| c.code.clone())),
            payment_intent_id: Set(None),
            shipping_address: Set(input
                .shipping_address
                .as_ref()
                .and_then(|a| serde_json::to_string(a).ok())),
            created_at: Set(now),
            updated_at: Set(now),
        };
        order_model.insert(&txn).await?;

        for item in &cart.items {
            let order_item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                name: Set(item.name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                line_total: Set(item.line_total),
            };
            order_item.insert(&txn).await?;
        }

        let session = checkout_session::ActiveModel {
            id: Set(session_id),
            cart_id: Set(input.cart_id),
            order_id: Set(Some(order_id)),
            status: Set(CheckoutStatus::Pending),
            total_amount: Set(draft.total_amount),
            expires_at: Set(now + Duration::minutes(self.config.checkout_ttl_minutes)),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
        };
        session.insert(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                cart_id: input.cart_id,
                session_id,
            })
            .await;

        // The order is committed; from here on a gateway failure leaves it
        // behind for reconciliation rather than rolling anything back.
        let intent_request = CreateIntentRequest {
            amount_minor: to_minor_units(draft.total_amount)?,
            currency: cart.cart.currency.clone(),
            order_id,
            customer_email: input.customer_email.clone(),
            description: Some(format!("Order {}", order_number)),
        };

        let intent = match self.gateway.create_intent(intent_request).await {
            Ok(intent) => intent,
            Err(err) => {
                self.set_session_status(session_id, CheckoutStatus::Failed)
                    .await?;
                warn!(order_id = %order_id, "Payment sheet init failed: {}", err);
                return Err(err);
            }
        };

        let mut order_update: order::ActiveModel = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?
            .into();
        order_update.payment_intent_id = Set(Some(intent.id.clone()));
        order_update.updated_at = Set(Utc::now());
        order_update.update(&*self.db).await?;

        self.set_session_status(session_id, CheckoutStatus::AwaitingPayment)
            .await?;
        self.cart_service
            .set_status(input.cart_id, CartStatus::Converting)
            .await?;

        info!(
            order_id = %order_id,
            session_id = %session_id,
            total = %draft.total_amount,
            "Checkout started; awaiting payment sheet"
        );

        Ok(StartCheckoutResponse {
            session_id,
            order_id,
            order_number,
            customer_id: input.customer_id,
            payment_intent: intent,
        })
    }

    /// Reconciles a successful payment: marks the order paid, then runs the
    /// post-success steps best-effort. Coupon usage tracking and cart
    /// clearing failures are logged, never surfaced; the customer has paid.
    #[instrument(skip(self))]
    pub async fn complete_checkout(&self, session_id: Uuid) -> Result<Uuid, ServiceError> {
        let session = self.get_session(session_id).await?;

        // Re-reporting a finished payment is a no-op; the cart was already
        // cleared exactly once.
        if session.status == CheckoutStatus::Completed {
            return session.order_id.ok_or_else(|| {
                ServiceError::InternalError("Completed session without order".to_string())
            });
        }

        if session.status != CheckoutStatus::AwaitingPayment {
            return Err(ServiceError::InvalidOperation(format!(
                "Checkout session is not awaiting payment (status: {:?})",
                session.status
            )));
        }

        // Expired reservations are released rather than completed; the
        // payment sheet was abandoned long enough ago that the sweep may
        // already have reclaimed the order.
        if session.expires_at < Utc::now() {
            self.release_session(session).await?;
            return Err(ServiceError::InvalidOperation(
                "Checkout session has expired".to_string(),
            ));
        }

        let order_id = session.order_id.ok_or_else(|| {
            ServiceError::InternalError("Checkout session without order".to_string())
        })?;

        let order = self
            .order_service
            .set_payment_outcome(order_id, OrderStatus::Paid)
            .await?;

        let mut active: checkout_session::ActiveModel = session.into();
        active.status = Set(CheckoutStatus::Completed);
        active.updated_at = Set(Utc::now());
        active.completed_at = Set(Some(Utc::now()));
        let session = active.update(&*self.db).await?;

        if let Some(code) = &order.coupon_code {
            if let Err(err) = self.coupon_service.track_usage(code).await {
                warn!(order_id = %order_id, code = %code, "Coupon usage tracking failed: {}", err);
            } else {
                self.event_sender
                    .send_or_log(Event::CouponApplied {
                        order_id,
                        code: code.clone(),
                    })
                    .await;
            }
        }

        if let Err(err) = self.cart_service.clear_cart(session.cart_id).await {
            warn!(cart_id = %session.cart_id, "Post-payment cart clear failed: {}", err);
        } else if let Err(err) = self
            .cart_service
            .set_status(session.cart_id, CartStatus::Converted)
            .await
        {
            warn!(cart_id = %session.cart_id, "Cart status update failed: {}", err);
        }

        self.event_sender
            .send_or_log(Event::OrderCompleted(order_id))
            .await;

        // Feed entry is best-effort too; preferences may suppress it.
        if let Err(err) = self
            .notification_service
            .queue(
                order.customer_id,
                NotificationKind::OrderUpdate,
                format!("Order {} confirmed", order.order_number),
                "Payment received. We're getting your order ready.".to_string(),
            )
            .await
        {
            warn!(order_id = %order_id, "Order notification failed: {}", err);
        }

        info!(order_id = %order_id, "Checkout completed");
        Ok(order_id)
    }

    /// Reconciles a dismissed payment sheet: deletes the just-created order
    /// (exactly one compensating delete), best-effort cancels the intent,
    /// and restores the cart so its contents are untouched.
    #[instrument(skip(self))]
    pub async fn cancel_checkout(&self, session_id: Uuid) -> Result<(), ServiceError> {
        let session = self.get_session(session_id).await?;

        // Repeated cancels are idempotent.
        if session.status == CheckoutStatus::Cancelled {
            return Ok(());
        }

        if !matches!(
            session.status,
            CheckoutStatus::Pending | CheckoutStatus::AwaitingPayment
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "Checkout session cannot be cancelled (status: {:?})",
                session.status
            )));
        }

        self.release_session(session).await?;

        info!(session_id = %session_id, "Checkout cancelled");
        Ok(())
    }

    /// Releases a reservation: deletes the session's order (exactly one
    /// compensating delete), best-effort cancels the intent, marks the
    /// session cancelled, and restores the cart.
    async fn release_session(
        &self,
        session: checkout_session::Model,
    ) -> Result<(), ServiceError> {
        if let Some(order_id) = session.order_id {
            let intent_id = Order::find_by_id(order_id)
                .one(&*self.db)
                .await?
                .and_then(|o| o.payment_intent_id);

            self.order_service.delete_order(order_id).await?;

            if let Some(intent_id) = intent_id {
                if let Err(err) = self.gateway.cancel_intent(&intent_id).await {
                    warn!(order_id = %order_id, "Payment intent cancel failed: {}", err);
                }
            }
        }

        let cart_id = session.cart_id;
        let mut active: checkout_session::ActiveModel = session.into();
        active.status = Set(CheckoutStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        if let Err(err) = self
            .cart_service
            .set_status(cart_id, CartStatus::Active)
            .await
        {
            warn!(cart_id = %cart_id, "Cart restore failed after release: {}", err);
        }

        Ok(())
    }

    /// Releases every reservation whose deadline has passed. Run periodically
    /// by the expiry sweep so abandoned payment sheets never leave orphaned
    /// unpaid orders behind.
    #[instrument(skip(self))]
    pub async fn release_expired(&self) -> Result<u64, ServiceError> {
        let stale = CheckoutSession::find()
            .filter(
                checkout_session::Column::Status.is_in([
                    CheckoutStatus::Pending,
                    CheckoutStatus::AwaitingPayment,
                ]),
            )
            .filter(checkout_session::Column::ExpiresAt.lt(Utc::now()))
            .all(&*self.db)
            .await?;

        let mut released = 0u64;
        for session in stale {
            let session_id = session.id;
            match self.release_session(session).await {
                Ok(()) => {
                    info!(session_id = %session_id, "Expired checkout released");
                    released += 1;
                }
                Err(err) => {
                    warn!(session_id = %session_id, "Failed to release expired checkout: {}", err);
                }
            }
        }

        Ok(released)
    }

    /// Records a payment failure. The order is left behind for manual or
    /// backend reconciliation; there is no automatic retry or rollback.
    #[instrument(skip(self))]
    pub async fn fail_checkout(
        &self,
        session_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let session = self.get_session(session_id).await?;

        if session.status != CheckoutStatus::AwaitingPayment {
            return Err(ServiceError::InvalidOperation(format!(
                "Checkout session is not awaiting payment (status: {:?})",
                session.status
            )));
        }

        let order_id = session.order_id.ok_or_else(|| {
            ServiceError::InternalError("Checkout session without order".to_string())
        })?;

        let order = self
            .order_service
            .set_payment_outcome(order_id, OrderStatus::PaymentFailed)
            .await?;

        let mut active: checkout_session::ActiveModel = session.into();
        active.status = Set(CheckoutStatus::Failed);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentFailed {
                order_id,
                reason: reason.unwrap_or_else(|| "payment declined".to_string()),
            })
            .await;

        if let Err(err) = self
            .notification_service
            .queue(
                order.customer_id,
                NotificationKind::OrderUpdate,
                format!("Payment problem with order {}", order.order_number),
                "Your payment didn't go through. Please try again.".to_string(),
            )
            .await
        {
            warn!(order_id = %order_id, "Order notification failed: {}", err);
        }

        info!(order_id = %order_id, "Checkout failed; order left for reconciliation");
        Ok(())
    }

    /// Retrieves a checkout session.
    pub async fn get_session(
        &self,
        session_id: Uuid,
    ) -> Result<checkout_session::Model, ServiceError> {
        CheckoutSession::find_by_id(session_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Checkout session {} not found", session_id))
            })
    }

    async fn set_session_status(
        &self,
        session_id: Uuid,
        status: CheckoutStatus,
    ) -> Result<(), ServiceError> {
        let session = self.get_session(session_id).await?;
        let mut active: checkout_session::ActiveModel = session.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }
}

/// GST portion of a GST-inclusive total: `total * r / (1 + r)`. At the
/// default 10% rate this is `total * 10 / 110`.
pub fn gst_portion(total: Decimal, rate: Decimal) -> Decimal {
    if rate <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (total * rate / (Decimal::ONE + rate))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Ephemeral order draft: assembled at checkout, consumed once, never
/// persisted.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub coupon: Option<ValidatedCoupon>,
    pub shipping_total: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Shipping address snapshot serialized onto the order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(equal = 2))]
    pub country_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartCheckoutInput {
    pub cart_id: Uuid,
    pub customer_id: Uuid,
    pub coupon_code: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate]
    pub shipping_address: Option<ShippingAddress>,
}

/// Everything the mobile client needs to present the hosted payment sheet.
#[derive(Debug, Serialize)]
pub struct StartCheckoutResponse {
    pub session_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub payment_intent: PaymentIntent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn gst_extracted_from_inclusive_total() {
        // 110 GST-inclusive at 10% carries exactly 10 of GST.
        assert_eq!(gst_portion(dec!(110), dec!(0.10)), dec!(10.00));
    }

    #[test]
    fn gst_rounds_to_cents() {
        // 99.99 * 10 / 110 = 9.0899... -> 9.09
        assert_eq!(gst_portion(dec!(99.99), dec!(0.10)), dec!(9.09));
    }

    #[test]
    fn gst_zero_rate_extracts_nothing() {
        assert_eq!(gst_portion(dec!(110), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn gst_of_zero_total_is_zero() {
        assert_eq!(gst_portion(Decimal::ZERO, dec!(0.10)), Decimal::ZERO);
    }

    #[test]
    fn draft_total_combines_discount_and_shipping() {
        // Subtotal 100 with a 10% coupon and free shipping (over threshold).
        let subtotal = dec!(100);
        let discount = dec!(10.00);
        let shipping = shipping_for(subtotal, dec!(10), dec!(50));
        let total = subtotal - discount + shipping;

        assert_eq!(shipping, Decimal::ZERO);
        assert_eq!(total, dec!(90.00));
    }

    #[test]
    fn draft_total_with_flat_shipping() {
        let subtotal = dec!(30);
        let shipping = shipping_for(subtotal, dec!(10), dec!(50));
        let total = subtotal - Decimal::ZERO + shipping;

        assert_eq!(total, dec!(40));
        // GST portion of the inclusive total.
        assert_eq!(gst_portion(total, dec!(0.10)), dec!(3.64));
    }

    #[test]
    fn start_checkout_input_rejects_bad_email() {
        let input = StartCheckoutInput {
            cart_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            coupon_code: None,
            customer_email: Some("not-an-email".to_string()),
            shipping_address: None,
        };

        assert!(input.validate().is_err());
    }

    #[test]
    fn start_checkout_input_accepts_minimal_payload() {
        let input = StartCheckoutInput {
            cart_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            coupon_code: Some("FRESH10".to_string()),
            customer_email: Some("shopper@example.com".to_string()),
            shipping_address: None,
        };

        assert!(input.validate().is_ok());
    }
}
