//! Wire-level tests for the hosted payment gateway client.

use freshcart_api::{
    errors::ServiceError,
    payments::{CreateIntentRequest, HostedPaymentClient, PaymentGateway},
};
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn intent_request() -> CreateIntentRequest {
    CreateIntentRequest {
        amount_minor: 2530,
        currency: "AUD".into(),
        order_id: Uuid::new_v4(),
        customer_email: Some("shopper@example.com".into()),
        description: Some("Order ORD-550E8400".into()),
    }
}

#[tokio::test]
async fn create_intent_posts_amount_and_parses_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_partial_json(json!({
            "amount_minor": 2530,
            "currency": "AUD"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_abc",
            "client_secret": "pi_abc_secret",
            "amount_minor": 2530,
            "currency": "AUD",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HostedPaymentClient::new(server.uri(), "sk_test_123");
    let intent = client
        .create_intent(intent_request())
        .await
        .expect("intent created");

    assert_eq!(intent.id, "pi_abc");
    assert_eq!(intent.client_secret, "pi_abc_secret");
    assert_eq!(intent.amount_minor, 2530);
}

#[tokio::test]
async fn gateway_error_message_is_extracted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "amount below minimum" }
        })))
        .mount(&server)
        .await;

    let client = HostedPaymentClient::new(server.uri(), "sk_test_123");
    let err = client
        .create_intent(intent_request())
        .await
        .expect_err("gateway rejects");

    match err {
        ServiceError::GatewayError(message) => assert_eq!(message, "amount below minimum"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unparseable_error_body_falls_back_to_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = HostedPaymentClient::new(server.uri(), "sk_test_123");
    let err = client
        .create_intent(intent_request())
        .await
        .expect_err("server error");

    match err {
        ServiceError::GatewayError(message) => {
            assert!(message.contains("500"), "message was: {}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn cancel_intent_hits_cancel_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_abc/cancel"))
        .and(header("authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_abc",
            "status": "canceled"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HostedPaymentClient::new(server.uri(), "sk_test_123");
    client
        .cancel_intent("pi_abc")
        .await
        .expect("cancel succeeds");
}
