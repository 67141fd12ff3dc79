use crate::{
    config::AppConfig,
    entities::{
        cart, cart_item, product, Cart, CartItem, CartModel, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Upper bound on a single line item's quantity.
const MAX_LINE_QUANTITY: i32 = 999;

/// Shopping cart service.
///
/// Owns the server-side cart state the storefront mirrors: line items and
/// totals. Every mutation recalculates totals so the client never needs to.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Creates a new, empty shopping cart.
    #[instrument(skip(self))]
    pub async fn create_cart(&self, input: CreateCartInput) -> Result<CartModel, ServiceError> {
        let cart_id = Uuid::new_v4();

        let cart = cart::ActiveModel {
            id: Set(cart_id),
            customer_id: Set(input.customer_id),
            currency: Set(input
                .currency
                .unwrap_or_else(|| self.config.default_currency.clone())),
            subtotal: Set(Decimal::ZERO),
            shipping_total: Set(Decimal::ZERO),
            total: Set(Decimal::ZERO),
            status: Set(cart::CartStatus::Active),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let cart = cart.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartCreated(cart_id))
            .await;

        info!("Created cart: {}", cart_id);
        Ok(cart)
    }

    /// Adds a product to the cart, merging quantity when the product is
    /// already a line item. Recalculates totals afterwards.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartModel, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        if cart.status != cart::CartStatus::Active {
            return Err(ServiceError::InvalidOperation(
                "Cart is not active".to_string(),
            ));
        }

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if product.status != product::ProductStatus::Active {
            return Err(ServiceError::InvalidOperation(
                "Product is no longer available".to_string(),
            ));
        }

        let existing_item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing_item {
            let quantity = merged_quantity(item.quantity, input.quantity)?;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.line_total = Set(product.price * Decimal::from(quantity));
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let quantity = merged_quantity(0, input.quantity)?;
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                product_id: Set(input.product_id),
                quantity: Set(quantity),
                unit_price: Set(product.price),
                line_total: Set(product.price * Decimal::from(quantity)),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        let updated_cart = self.recalculate_totals(&txn, cart_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id,
                product_id: input.product_id,
            })
            .await;

        info!(
            "Added item to cart {}: product {} x{}",
            cart_id, input.product_id, input.quantity
        );
        Ok(updated_cart)
    }

    /// Updates a line item's quantity. A quantity of zero or less removes the
    /// item.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartModel, ServiceError> {
        let txn = self.db.begin().await?;

        let item = CartItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        // Ownership check holds for removal as well, so a caller with one
        // cart id can never delete another cart's line.
        if item.cart_id != cart_id {
            return Err(ServiceError::InvalidOperation(
                "Item does not belong to this cart".to_string(),
            ));
        }

        if quantity <= 0 {
            CartItem::delete_by_id(item.id).exec(&txn).await?;
        } else {
            let quantity = merged_quantity(0, quantity)?;
            let unit_price = item.unit_price;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.line_total = Set(unit_price * Decimal::from(quantity));
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        }

        let updated_cart = self.recalculate_totals(&txn, cart_id).await?;
        txn.commit().await?;

        Ok(updated_cart)
    }

    /// Removes a line item from the cart.
    pub async fn remove_item(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        self.update_item_quantity(cart_id, item_id, 0).await
    }

    /// Retrieves a cart with its line items joined against products, so the
    /// view carries product name, weight, and cover image.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let items = rows
            .into_iter()
            .map(|(item, product)| CartItemDetail::from_row(item, product))
            .collect();

        Ok(CartWithItems { cart, items })
    }

    /// Retrieves a cart without loading its items.
    pub async fn get_cart_model(&self, cart_id: Uuid) -> Result<CartModel, ServiceError> {
        Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))
    }

    /// Clears all items from a cart and resets totals to zero. Called
    /// best-effort by the checkout path after a successful payment.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?;

        let mut cart: cart::ActiveModel = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?
            .into();

        cart.subtotal = Set(Decimal::ZERO);
        cart.shipping_total = Set(Decimal::ZERO);
        cart.total = Set(Decimal::ZERO);
        cart.updated_at = Set(Utc::now());
        cart.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart_id))
            .await;

        info!("Cleared cart: {}", cart_id);
        Ok(())
    }

    /// Moves a cart between lifecycle states (checkout marks it converting,
    /// a cancelled checkout restores it to active).
    pub async fn set_status(
        &self,
        cart_id: Uuid,
        status: cart::CartStatus,
    ) -> Result<CartModel, ServiceError> {
        let mut cart: cart::ActiveModel = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?
            .into();

        cart.status = Set(status);
        cart.updated_at = Set(Utc::now());
        Ok(cart.update(&*self.db).await?)
    }

    /// Recalculate cart totals: subtotal from line totals, shipping from the
    /// configured flat rate and free-shipping threshold.
    async fn recalculate_totals(
        &self,
        conn: &impl sea_orm::ConnectionTrait,
        cart_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let subtotal: Decimal = items.iter().map(|item| item.line_total).sum();
        let shipping_total = shipping_for(
            subtotal,
            self.config.shipping_flat_rate,
            self.config.free_shipping_threshold,
        );
        let total = subtotal + shipping_total;

        let mut cart: cart::ActiveModel = Cart::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?
            .into();

        cart.subtotal = Set(subtotal);
        cart.shipping_total = Set(shipping_total);
        cart.total = Set(total);
        cart.updated_at = Set(Utc::now());

        info!(
            "Recalculated cart {}: subtotal={}, shipping={}, total={}",
            cart_id, subtotal, shipping_total, total
        );

        Ok(cart.update(conn).await?)
    }
}

/// Merged line quantity, rejecting totals that overflow or exceed the
/// per-line cap.
fn merged_quantity(existing: i32, added: i32) -> Result<i32, ServiceError> {
    existing
        .checked_add(added)
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "Line quantity cannot exceed {}",
                MAX_LINE_QUANTITY
            ))
        })
}

/// Shipping is a flat rate below the free-shipping threshold and free at or
/// above it. Empty carts ship nothing.
pub fn shipping_for(subtotal: Decimal, flat_rate: Decimal, free_threshold: Decimal) -> Decimal {
    if subtotal >= free_threshold || subtotal <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        flat_rate
    }
}

/// Input for creating a cart
#[derive(Debug, Deserialize)]
pub struct CreateCartInput {
    pub customer_id: Option<Uuid>,
    pub currency: Option<String>,
}

/// Input for adding an item to a cart
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Cart with joined item detail
#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: CartModel,
    pub items: Vec<CartItemDetail>,
}

/// Line item enriched with product fields the storefront renders.
#[derive(Debug, Serialize)]
pub struct CartItemDetail {
    pub basket_item_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub unit_weight_grams: i32,
    pub image_url: Option<String>,
    pub line_total: Decimal,
}

impl CartItemDetail {
    fn from_row(item: cart_item::Model, product: Option<product::Model>) -> Self {
        let (name, weight, image_url) = match product {
            Some(p) => (p.name, p.unit_weight_grams, p.image_url),
            // Product row deleted out from under the cart; keep the line
            // renderable rather than failing the whole view.
            None => ("Unavailable product".to_string(), 0, None),
        };

        Self {
            basket_item_id: item.id,
            product_id: item.product_id,
            name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            unit_weight_grams: weight,
            image_url,
            line_total: item.line_total,
        }
    }
}
