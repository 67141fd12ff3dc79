//! Shared scaffolding for integration tests.
//!
//! Database-backed tests expect `TEST_DATABASE_URL` to point at a disposable
//! Postgres database and are marked `#[ignore]` so the default test run stays
//! hermetic.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use freshcart_api::{
    config::AppConfig,
    entities::{coupon, product},
    errors::ServiceError,
    events::{process_events, EventSender},
    payments::{CreateIntentRequest, PaymentGateway, PaymentIntent},
    services::AppServices,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use uuid::Uuid;

/// Gateway double that hands out deterministic intents and records cancels.
/// Set `fail_next` to make the next `create_intent` call fail.
#[derive(Default)]
pub struct ScriptedGateway {
    pub fail_next: Mutex<bool>,
    pub created: Mutex<Vec<CreateIntentRequest>>,
    pub cancelled: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl ScriptedGateway {
    pub fn failing_once(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn cancel_count(&self) -> usize {
        self.cancelled.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(ServiceError::GatewayError("scripted failure".into()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let intent = PaymentIntent {
            id: format!("pi_test_{}", n),
            client_secret: format!("pi_test_{}_secret", n),
            amount_minor: request.amount_minor,
            currency: request.currency.clone(),
            status: "requires_payment_method".into(),
        };
        self.created.lock().unwrap().push(request);
        Ok(intent)
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), ServiceError> {
        self.cancelled.lock().unwrap().push(intent_id.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub gateway: Arc<ScriptedGateway>,
    pub config: Arc<AppConfig>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: std::env::var("TEST_DATABASE_URL").unwrap_or_default(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "debug".into(),
        log_json: false,
        payment_gateway_url: "http://localhost:0".into(),
        payment_gateway_secret: "sk_test".into(),
        gst_rate: dec!(0.10),
        shipping_flat_rate: dec!(10),
        free_shipping_threshold: dec!(50),
        default_currency: "AUD".into(),
        checkout_ttl_minutes: 30,
    }
}

impl TestApp {
    /// Connects to `TEST_DATABASE_URL` and wires the full service graph with
    /// a scripted payment gateway. Panics when the variable is unset, which
    /// is why callers are `#[ignore]`d by default.
    pub async fn new() -> Self {
        let url = std::env::var("TEST_DATABASE_URL")
            .expect("TEST_DATABASE_URL must point at a disposable test database");
        let db = Arc::new(Database::connect(url).await.expect("test database"));

        let (tx, rx) = tokio::sync::mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(tx));
        tokio::spawn(process_events(rx));

        let gateway = Arc::new(ScriptedGateway::default());
        let config = Arc::new(test_config());
        let services = AppServices::new(
            db.clone(),
            event_sender,
            gateway.clone(),
            config.clone(),
        );

        Self {
            db,
            services,
            gateway,
            config,
        }
    }

    /// Inserts an active product with the given price.
    pub async fn seed_product(&self, name: &str, price: Decimal) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            unit_weight_grams: Set(500),
            image_url: Set(None),
            category: Set(Some("test".into())),
            status: Set(product::ProductStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }

    /// Inserts an active coupon valid for the next hour.
    pub async fn seed_coupon(
        &self,
        code: &str,
        discount_type: coupon::DiscountType,
        value: Decimal,
    ) -> coupon::Model {
        let now = Utc::now();
        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            discount_type: Set(discount_type),
            discount_value: Set(value),
            min_order_amount: Set(None),
            usage_limit: Set(None),
            usage_count: Set(0),
            starts_at: Set(now - chrono::Duration::hours(1)),
            expires_at: Set(now + chrono::Duration::hours(1)),
            status: Set(coupon::CouponStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed coupon")
    }
}
