//! Integration tests for the paginated list endpoints backing the
//! infinite-scroll screens.

mod common;

use common::TestApp;
use freshcart_api::{
    pagination::PageParams,
    services::{
        addresses::SaveAddressInput,
        notifications::NotificationKind,
        reviews::SubmitReviewInput,
    },
};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn page(page: u64, per_page: u64) -> PageParams {
    PageParams { page, per_page }.clamped()
}

fn address_input(label: &str, is_default: bool) -> SaveAddressInput {
    SaveAddressInput {
        label: Some(label.to_string()),
        line1: "12 Wattle St".into(),
        line2: None,
        city: "Melbourne".into(),
        state: "VIC".into(),
        postal_code: "3000".into(),
        country_code: "AU".into(),
        phone: None,
        is_default,
    }
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn notification_feed_pages_until_exhausted() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    for n in 0..25 {
        app.services
            .notifications
            .queue(
                customer_id,
                NotificationKind::OrderUpdate,
                format!("Update {}", n),
                "Your order moved along".into(),
            )
            .await
            .expect("queue notification")
            .expect("defaults allow order updates");
    }

    let first = app
        .services
        .notifications
        .list_notifications(customer_id, page(1, 10))
        .await
        .expect("page 1");
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.total, 25);
    assert!(first.has_more);

    let last = app
        .services
        .notifications
        .list_notifications(customer_id, page(3, 10))
        .await
        .expect("page 3");
    assert_eq!(last.items.len(), 5);
    assert!(!last.has_more);

    // Newest first.
    assert_eq!(first.items[0].title, "Update 24");
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn unread_count_tracks_mark_read() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let queued = app
        .services
        .notifications
        .queue(
            customer_id,
            NotificationKind::Reminder,
            "Milk running low?".into(),
            "Reorder your staples".into(),
        )
        .await
        .expect("queue")
        .expect("reminders allowed by default");

    assert_eq!(
        app.services
            .notifications
            .unread_count(customer_id)
            .await
            .expect("count"),
        1
    );

    app.services
        .notifications
        .mark_read(customer_id, queued.id)
        .await
        .expect("mark read");

    assert_eq!(
        app.services
            .notifications
            .unread_count(customer_id)
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn disabled_preference_suppresses_queueing() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    app.services
        .notifications
        .update_preferences(
            customer_id,
            serde_json::from_str(r#"{"promotions": false}"#).expect("input"),
        )
        .await
        .expect("update preferences");

    let suppressed = app
        .services
        .notifications
        .queue(
            customer_id,
            NotificationKind::Promotion,
            "Weekend special".into(),
            "Half-price berries".into(),
        )
        .await
        .expect("queue call succeeds");
    assert!(suppressed.is_none());
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn first_address_becomes_default_and_default_sorts_first() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let first = app
        .services
        .addresses
        .create_address(customer_id, address_input("Home", false))
        .await
        .expect("first address");
    assert!(first.is_default, "first saved address becomes default");

    let second = app
        .services
        .addresses
        .create_address(customer_id, address_input("Work", true))
        .await
        .expect("second address");
    assert!(second.is_default);

    let listed = app
        .services
        .addresses
        .list_addresses(customer_id, page(1, 20))
        .await
        .expect("list");
    assert_eq!(listed.total, 2);
    assert_eq!(listed.items[0].id, second.id, "default first");
    // Exactly one default at any time.
    assert_eq!(listed.items.iter().filter(|a| a.is_default).count(), 1);
}

#[tokio::test]
#[ignore = "requires database integration environment"]
async fn review_resubmission_replaces_earlier_rating() {
    let app = TestApp::new().await;
    let product = app.seed_product("Greek Yoghurt", dec!(6.00)).await;
    let customer_id = Uuid::new_v4();

    app.services
        .reviews
        .submit_review(
            product.id,
            SubmitReviewInput {
                customer_id,
                rating: 2,
                comment: Some("Arrived warm".into()),
            },
        )
        .await
        .expect("first review");

    app.services
        .reviews
        .submit_review(
            product.id,
            SubmitReviewInput {
                customer_id,
                rating: 5,
                comment: Some("Replacement was perfect".into()),
            },
        )
        .await
        .expect("resubmission");

    let listed = app
        .services
        .reviews
        .list_reviews(product.id, page(1, 20))
        .await
        .expect("list");
    assert_eq!(listed.total, 1, "one review per customer per product");
    assert_eq!(listed.items[0].rating, 5);

    let average = app
        .services
        .reviews
        .average_rating(product.id)
        .await
        .expect("average");
    assert_eq!(average, Some(5.0));
}
