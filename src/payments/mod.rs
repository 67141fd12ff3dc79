//! Client for the hosted payment-sheet provider.
//!
//! The storefront never touches card data: checkout creates a payment intent
//! here, hands the returned client secret to the mobile client, and the
//! hosted payment sheet takes it from there.

use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

/// Request to create a payment intent. Amounts are in minor units (cents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub order_id: Uuid,
    pub customer_email: Option<String>,
    pub description: Option<String>,
}

/// Payment intent as returned by the gateway. The client secret initializes
/// the hosted payment sheet and is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
}

/// Error body shape the gateway returns; message extraction is best-effort.
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: Option<GatewayErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetails {
    message: Option<String>,
}

/// Abstraction over the hosted payment provider so the checkout orchestrator
/// can be exercised without network access.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for the given amount.
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError>;

    /// Cancels a previously created intent. Idempotent on the gateway side.
    async fn cancel_intent(&self, intent_id: &str) -> Result<(), ServiceError>;
}

/// Production gateway client speaking JSON over HTTPS with secret-key bearer
/// auth.
#[derive(Debug, Clone)]
pub struct HostedPaymentClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HostedPaymentClient {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn error_from_response(response: reqwest::Response) -> ServiceError {
        let status = response.status();
        let message = match response.json::<GatewayErrorBody>().await {
            Ok(body) => body
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("gateway returned {}", status)),
            Err(_) => format!("gateway returned {}", status),
        };
        ServiceError::GatewayError(message)
    }
}

#[async_trait]
impl PaymentGateway for HostedPaymentClient {
    #[instrument(skip(self), fields(order_id = %request.order_id))]
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        let url = format!("{}/v1/payment_intents", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("invalid intent response: {}", e)))?;

        info!(intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn cancel_intent(&self, intent_id: &str) -> Result<(), ServiceError> {
        let url = format!("{}/v1/payment_intents/{}/cancel", self.base_url, intent_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        info!(intent_id = %intent_id, "Payment intent cancelled");
        Ok(())
    }
}

/// Converts a decimal amount to gateway minor units (cents), rounding to the
/// nearest cent.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::InvalidInput(format!("amount {} out of range", amount)))
}
