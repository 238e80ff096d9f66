use hmac::{Hmac, Mac};
use rocket::http::{Header, Status};
use serde_json::json;
use sha2::Sha256;

use crate::db::{get_profile, get_user, list_notifications};
use crate::subscription::{AccessState, SubscriptionStatus};
use crate::test::utils::{
    TEST_WEBHOOK_SECRET, TestDbBuilder, login_test_user, setup_test_client,
    setup_test_client_with_config, test_config,
};

type HmacSha256 = Hmac<Sha256>;

fn stripe_signature_header(payload: &str, secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}

fn checkout_completed_event(user_id: i64, customer: &str) -> String {
    json!({
        "id": "evt_checkout_1",
        "type": "checkout.session.completed",
        "created": chrono::Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "cs_test_1",
                "client_reference_id": user_id.to_string(),
                "customer": customer
            }
        }
    })
    .to_string()
}

fn subscription_event(event_type: &str, customer: &str, status: &str) -> String {
    json!({
        "id": "evt_sub_1",
        "type": event_type,
        "created": chrono::Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "sub_test_1",
                "customer": customer,
                "status": status
            }
        }
    })
    .to_string()
}

#[rocket::async_test]
async fn checkout_completed_webhook_activates_subscription() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");

    let user_id = test_db.user_id("ella@example.com").unwrap();
    let (client, test_db) = setup_test_client(test_db).await;

    let payload = checkout_completed_event(user_id, "cus_123");
    let response = client
        .post("/api/stripe/webhook")
        .header(Header::new(
            "Stripe-Signature",
            stripe_signature_header(&payload, TEST_WEBHOOK_SECRET),
        ))
        .body(payload)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);

    let profile = get_profile(&test_db.pool, user_id).await.unwrap();
    assert_eq!(profile.subscription_status, Some(SubscriptionStatus::Pro));
    assert_eq!(profile.access_state, AccessState::ConfirmedPro);
    assert!(profile.was_premium);
    assert_eq!(profile.status_source.as_deref(), Some("webhook"));

    let user = get_user(&test_db.pool, user_id).await.unwrap();
    assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_123"));
    assert_eq!(user.subscription_status, Some(SubscriptionStatus::Pro));

    let notifications = list_notifications(&test_db.pool, user_id).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, "billing");

    // The user can now reach gated routes.
    login_test_user(&client, "ella@example.com").await;
    let response = client.get("/api/artists").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn subscription_lifecycle_through_webhooks() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");

    let user_id = test_db.user_id("ella@example.com").unwrap();
    let (client, test_db) = setup_test_client(test_db).await;

    let payload = checkout_completed_event(user_id, "cus_123");
    client
        .post("/api/stripe/webhook")
        .header(Header::new(
            "Stripe-Signature",
            stripe_signature_header(&payload, TEST_WEBHOOK_SECRET),
        ))
        .body(payload)
        .dispatch()
        .await;

    // Payment trouble: past_due keeps the confirmed-pro state.
    let payload = subscription_event("customer.subscription.updated", "cus_123", "past_due");
    let response = client
        .post("/api/stripe/webhook")
        .header(Header::new(
            "Stripe-Signature",
            stripe_signature_header(&payload, TEST_WEBHOOK_SECRET),
        ))
        .body(payload)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let profile = get_profile(&test_db.pool, user_id).await.unwrap();
    assert_eq!(profile.subscription_status, Some(SubscriptionStatus::PastDue));
    assert_eq!(profile.access_state, AccessState::ConfirmedPro);
    assert!(profile.was_premium);

    // Previously-premium override keeps the user in while past due.
    login_test_user(&client, "ella@example.com").await;
    let response = client.get("/api/artists").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    // Cancellation ends it for good.
    let payload = subscription_event("customer.subscription.deleted", "cus_123", "canceled");
    let response = client
        .post("/api/stripe/webhook")
        .header(Header::new(
            "Stripe-Signature",
            stripe_signature_header(&payload, TEST_WEBHOOK_SECRET),
        ))
        .body(payload)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let profile = get_profile(&test_db.pool, user_id).await.unwrap();
    assert_eq!(
        profile.subscription_status,
        Some(SubscriptionStatus::Cancelled)
    );
    assert_eq!(profile.access_state, AccessState::ConfirmedFree);
    assert!(!profile.was_premium);

    let response = client.get("/api/artists").dispatch().await;
    assert_eq!(response.status(), Status::PaymentRequired);
}

#[rocket::async_test]
async fn webhook_rejects_invalid_signatures() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");

    let user_id = test_db.user_id("ella@example.com").unwrap();
    let (client, test_db) = setup_test_client(test_db).await;

    let payload = checkout_completed_event(user_id, "cus_123");
    let response = client
        .post("/api/stripe/webhook")
        .header(Header::new(
            "Stripe-Signature",
            stripe_signature_header(&payload, "whsec_wrong_secret"),
        ))
        .body(payload)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);

    let profile = get_profile(&test_db.pool, user_id).await.unwrap();
    assert_eq!(profile.access_state, AccessState::Unknown);
    assert!(!profile.was_premium);
}

#[rocket::async_test]
async fn webhook_requires_the_signature_header() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");

    let user_id = test_db.user_id("ella@example.com").unwrap();
    let (client, _) = setup_test_client(test_db).await;

    let response = client
        .post("/api/stripe/webhook")
        .body(checkout_completed_event(user_id, "cus_123"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn webhook_refuses_delivery_without_a_configured_secret() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");

    let user_id = test_db.user_id("ella@example.com").unwrap();

    let mut config = test_config();
    config.stripe.webhook_secret = None;
    let (client, test_db) = setup_test_client_with_config(test_db, config).await;

    // Even a correctly signed payload is refused: there is no secret to
    // verify it against, and trusting the body unsigned is not an option.
    let payload = checkout_completed_event(user_id, "cus_123");
    let response = client
        .post("/api/stripe/webhook")
        .header(Header::new(
            "Stripe-Signature",
            stripe_signature_header(&payload, TEST_WEBHOOK_SECRET),
        ))
        .body(payload)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::InternalServerError);

    let profile = get_profile(&test_db.pool, user_id).await.unwrap();
    assert_eq!(profile.access_state, AccessState::Unknown);
}

#[rocket::async_test]
async fn webhook_acknowledges_unsupported_events() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");

    let user_id = test_db.user_id("ella@example.com").unwrap();
    let (client, test_db) = setup_test_client(test_db).await;

    let payload = json!({
        "id": "evt_invoice_1",
        "type": "invoice.paid",
        "created": chrono::Utc::now().timestamp(),
        "data": { "object": { "customer": "cus_123" } }
    })
    .to_string();

    let response = client
        .post("/api/stripe/webhook")
        .header(Header::new(
            "Stripe-Signature",
            stripe_signature_header(&payload, TEST_WEBHOOK_SECRET),
        ))
        .body(payload)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);

    let profile = get_profile(&test_db.pool, user_id).await.unwrap();
    assert_eq!(profile.access_state, AccessState::Unknown);
}

#[rocket::async_test]
async fn webhook_for_unknown_customer_is_acknowledged() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");
    let (client, _) = setup_test_client(test_db).await;

    let payload = subscription_event("customer.subscription.updated", "cus_nobody", "active");
    let response = client
        .post("/api/stripe/webhook")
        .header(Header::new(
            "Stripe-Signature",
            stripe_signature_header(&payload, TEST_WEBHOOK_SECRET),
        ))
        .body(payload)
        .dispatch()
        .await;

    // Acknowledged so Stripe stops retrying an event we can never apply.
    assert_eq!(response.status(), Status::Ok);
}
