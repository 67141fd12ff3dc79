use crate::{
    entities::{
        order::{self, OrderStatus},
        order_item, Order, OrderItem, OrderModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    pagination::{PageParams, Paginated},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_total: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<OrderModel> for OrderResponse {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            status: model.status,
            subtotal: model.subtotal,
            discount_total: model.discount_total,
            shipping_total: model.shipping_total,
            tax_amount: model.tax_amount,
            total_amount: model.total_amount,
            currency: model.currency,
            coupon_code: model.coupon_code,
            created_at: model.created_at,
        }
    }
}

/// Order service: lookups, the customer's paginated order history, payment
/// outcome transitions, and the compensating delete used when a checkout is
/// cancelled.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Retrieves an order by id.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        Ok(order.into())
    }

    /// Retrieves an order's line items.
    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    /// Lists a customer's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: Uuid,
        page: PageParams,
    ) -> Result<Paginated<OrderResponse>, ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, page.per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.zero_based()).await?;

        Ok(Paginated::new(
            orders.into_iter().map(OrderResponse::from).collect(),
            total,
            page,
        ))
    }

    /// Records the payment outcome on an order.
    #[instrument(skip(self))]
    pub async fn set_payment_outcome(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(order_id = %order_id, status = ?status, "Order payment outcome recorded");
        Ok(updated.into())
    }

    /// Deletes an order and its items. This is the compensating action for a
    /// cancelled payment sheet; deleting an order that no longer exists is a
    /// no-op success so repeated cancels stay idempotent.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let Some(order) = Order::find_by_id(order_id).one(&txn).await? else {
            warn!(order_id = %order_id, "Delete requested for missing order; treating as already deleted");
            return Ok(());
        };

        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        Order::delete_by_id(order.id).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;

        info!(order_id = %order_id, "Order deleted");
        Ok(())
    }
}

/// Human-facing order number derived from the order id.
pub fn order_number_for(order_id: Uuid) -> String {
    let id = order_id.simple().to_string();
    format!("ORD-{}", id[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_number_is_prefixed_and_short() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(order_number_for(id), "ORD-550E8400");
    }

    #[test]
    fn order_numbers_differ_for_different_orders() {
        assert_ne!(order_number_for(Uuid::new_v4()), order_number_for(Uuid::new_v4()));
    }

    #[test]
    fn model_to_response_conversion() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();

        let model = OrderModel {
            id: order_id,
            order_number: "ORD-550E8400".to_string(),
            customer_id,
            status: OrderStatus::Pending,
            subtotal: dec!(100.00),
            discount_total: dec!(10.00),
            shipping_total: dec!(0.00),
            tax_amount: dec!(8.18),
            total_amount: dec!(90.00),
            currency: "AUD".to_string(),
            coupon_code: Some("FRESH10".to_string()),
            payment_intent_id: None,
            shipping_address: None,
            created_at: now,
            updated_at: now,
        };

        let response = OrderResponse::from(model);
        assert_eq!(response.id, order_id);
        assert_eq!(response.customer_id, customer_id);
        assert_eq!(response.status, OrderStatus::Pending);
        assert_eq!(response.total_amount, dec!(90.00));
        assert_eq!(response.coupon_code.as_deref(), Some("FRESH10"));
    }
}
