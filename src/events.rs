use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the storefront services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated(Uuid),
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartCleared(Uuid),

    // Checkout / order events
    CheckoutStarted { cart_id: Uuid, session_id: Uuid },
    OrderCreated(Uuid),
    OrderCompleted(Uuid),
    OrderCancelled(Uuid),
    PaymentFailed { order_id: Uuid, reason: String },

    // Coupon events
    CouponApplied { order_id: Uuid, code: String },

    // Notification events
    NotificationQueued { customer_id: Uuid, notification_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging a warning instead of failing. Used on paths
    /// where event delivery must never block the operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event delivery failed: {}", e);
        }
    }
}

/// Consumes events off the channel and logs them. Runs until the channel is
/// closed.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCompleted(order_id) => {
                info!(order_id = %order_id, "Order completed");
            }
            Event::PaymentFailed { order_id, reason } => {
                warn!(order_id = %order_id, reason = %reason, "Payment failed");
            }
            other => {
                info!(event = ?other, "Event processed");
            }
        }
    }
    info!("Event channel closed; processor shutting down");
}
