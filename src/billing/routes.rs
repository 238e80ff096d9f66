use std::time::Duration;

use chrono::Utc;
use rocket::State;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use rocket::tokio;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use validator::Validate;

use crate::auth::User;
use crate::db::{
    apply_status_signal, create_notification, find_user_by_customer_id, find_user_by_email,
    get_user, set_stripe_customer_id,
};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::models::Profile;
use crate::subscription::{StatusSignal, SubscriptionStatus, map_stripe_status};
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

use super::client::{CheckoutParams, StripeClient};
use super::webhook::{WebhookEvent, is_supported_event, verify_signature};

/// Post-checkout reconciliation: how many verify attempts, how far apart.
pub const VERIFY_ATTEMPTS: u32 = 5;
pub const VERIFY_INTERVAL: Duration = Duration::from_secs(2);

/// The `Stripe-Signature` header, required on webhook deliveries.
pub struct StripeSignature(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StripeSignature {
    type Error = ();

    async fn from_request(request: &'r rocket::Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one("Stripe-Signature") {
            Some(value) => Outcome::Success(StripeSignature(value.to_string())),
            None => Outcome::Error((Status::BadRequest, ())),
        }
    }
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Serialize)]
pub struct PortalResponse {
    pub url: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub status: &'static str,
    pub access_state: &'static str,
}

fn checkout_urls(config: &AppConfig) -> (String, String) {
    let success = format!(
        "{}/api/billing/checkout/complete?session={{CHECKOUT_SESSION_ID}}",
        config.public_app_url
    );
    let cancel = format!("{}/pricing", config.public_app_url);
    (success, cancel)
}

#[post("/billing/checkout")]
pub async fn api_create_checkout(
    user: User,
    stripe: &State<StripeClient>,
    config: &State<AppConfig>,
) -> Result<Json<CheckoutResponse>, Custom<Json<ValidationResponse>>> {
    let (success_url, cancel_url) = checkout_urls(config);
    let reference = user.id.to_string();

    let session = stripe
        .create_checkout_session(CheckoutParams {
            price_id: &config.stripe.price_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
            client_reference_id: Some(&reference),
            customer: user.stripe_customer_id.as_deref(),
            customer_email: if user.stripe_customer_id.is_none() {
                Some(&user.email)
            } else {
                None
            },
        })
        .await
        .validate_custom()?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

#[derive(Deserialize, Validate)]
pub struct GuestCheckoutRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
}

#[post("/billing/guest-checkout", data = "<request>")]
pub async fn api_create_guest_checkout(
    request: Json<GuestCheckoutRequest>,
    stripe: &State<StripeClient>,
    config: &State<AppConfig>,
) -> Result<Json<CheckoutResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let (success_url, cancel_url) = checkout_urls(config);

    let session = stripe
        .create_checkout_session(CheckoutParams {
            price_id: &config.stripe.price_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
            client_reference_id: None,
            customer: None,
            customer_email: Some(&validated.email),
        })
        .await
        .validate_custom()?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

#[post("/billing/portal")]
pub async fn api_create_portal(
    user: User,
    stripe: &State<StripeClient>,
    config: &State<AppConfig>,
) -> Result<Json<PortalResponse>, Custom<Json<ValidationResponse>>> {
    let customer = user
        .stripe_customer_id
        .as_deref()
        .ok_or_else(|| AppError::NotFound("No billing account for this user yet".to_string()))
        .validate_custom()?;

    let return_url = format!("{}/settings", config.public_app_url);

    let session = stripe
        .create_portal_session(customer, &return_url)
        .await
        .validate_custom()?;

    Ok(Json(PortalResponse { url: session.url }))
}

/// Resolve the user's Stripe customer (stored id, then email search), read
/// their most recent subscription, map it into the app vocabulary, and write
/// it through the arbiter. No customer or no subscription means `free`.
pub async fn verify_subscription(
    pool: &SqlitePool,
    stripe: &StripeClient,
    user: &User,
) -> Result<(SubscriptionStatus, Profile), AppError> {
    let customer_id = match &user.stripe_customer_id {
        Some(id) => Some(id.clone()),
        None => {
            let found = stripe.find_customer_by_email(&user.email).await?;
            if let Some(customer) = &found {
                set_stripe_customer_id(pool, user.id, &customer.id).await?;
            }
            found.map(|c| c.id)
        }
    };

    let status = match customer_id {
        Some(customer) => match stripe.latest_subscription(&customer).await? {
            Some(subscription) => map_stripe_status(&subscription.status),
            None => SubscriptionStatus::Free,
        },
        None => SubscriptionStatus::Free,
    };

    let profile =
        apply_status_signal(pool, user.id, &StatusSignal::verify(status, Utc::now())).await?;

    Ok((status, profile))
}

#[post("/billing/verify")]
pub async fn api_verify_subscription(
    user: User,
    db: &State<SqlitePool>,
    stripe: &State<StripeClient>,
) -> Result<Json<VerifyResponse>, Custom<Json<ValidationResponse>>> {
    let (status, profile) = verify_subscription(db, stripe, &user)
        .await
        .validate_custom()?;

    Ok(Json(VerifyResponse {
        status: status.as_str(),
        access_state: profile.access_state.as_str(),
    }))
}

/// Landing for the Stripe success redirect. Stamps the grace period so the
/// user is treated as paid immediately, then reconciles in the background
/// while the webhook is presumed in flight.
#[get("/billing/checkout/complete?<session>")]
pub async fn api_checkout_complete(
    session: Option<String>,
    user: User,
    db: &State<SqlitePool>,
    stripe: &State<StripeClient>,
    config: &State<AppConfig>,
) -> Result<Redirect, Status> {
    tracing::info!(user_id = user.id, session = ?session, "Checkout success redirect");

    apply_status_signal(db, user.id, &StatusSignal::checkout_redirect(Utc::now())).await?;

    let pool = db.inner().clone();
    let stripe = stripe.inner().clone();
    tokio::spawn(async move {
        reconcile_after_checkout(pool, stripe, user).await;
    });

    Ok(Redirect::to(format!(
        "{}/dashboard?checkout=success",
        config.public_app_url
    )))
}

/// Bounded fallback for a webhook that never arrives: up to
/// `VERIFY_ATTEMPTS` verify calls, `VERIFY_INTERVAL` apart, stopping early
/// once a premium status is confirmed. After the last attempt it simply
/// gives up; the webhook remains the long-term backstop.
pub async fn reconcile_after_checkout(pool: SqlitePool, stripe: StripeClient, user: User) {
    for attempt in 1..=VERIFY_ATTEMPTS {
        tokio::time::sleep(VERIFY_INTERVAL).await;

        // Re-read the user each attempt; the webhook may have landed a
        // customer id between polls.
        let current = match get_user(&pool, user.id).await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(user_id = user.id, error = ?err, "Post-checkout reconcile lost its user");
                return;
            }
        };

        match verify_subscription(&pool, &stripe, &current).await {
            Ok((status, _)) if status.is_premium() => {
                tracing::info!(user_id = user.id, attempt, status = %status, "Post-checkout verification confirmed subscription");
                return;
            }
            Ok((status, _)) => {
                tracing::info!(user_id = user.id, attempt, status = %status, "Subscription not confirmed yet");
            }
            Err(err) => {
                tracing::warn!(user_id = user.id, attempt, error = ?err, "Post-checkout verification attempt failed");
            }
        }
    }

    tracing::warn!(
        user_id = user.id,
        "Giving up on post-checkout verification; webhook will have to settle it"
    );
}

#[post("/stripe/webhook", data = "<payload>")]
pub async fn api_stripe_webhook(
    payload: &str,
    signature: StripeSignature,
    db: &State<SqlitePool>,
    config: &State<AppConfig>,
) -> Result<Json<Value>, Status> {
    // No secret, no service. Accepting unsigned payloads here would let
    // anyone mint themselves a subscription.
    let secret = match config.stripe.webhook_secret.as_deref() {
        Some(secret) => secret,
        None => {
            tracing::error!("STRIPE_WEBHOOK_SECRET is not configured; refusing webhook delivery");
            return Err(Status::InternalServerError);
        }
    };

    let now = Utc::now().timestamp();
    match verify_signature(payload.as_bytes(), &signature.0, secret, now) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Webhook signature rejected");
            return Err(Status::BadRequest);
        }
        Err(err) => {
            err.log_and_record("Stripe webhook signature header");
            return Err(Status::BadRequest);
        }
    }

    let event = WebhookEvent::parse(payload.as_bytes()).map_err(|err| {
        err.log_and_record("Stripe webhook payload");
        Status::BadRequest
    })?;

    if !is_supported_event(&event.event_type) {
        tracing::info!(event_type = %event.event_type, "Ignoring unsupported webhook event");
        return Ok(Json(json!({ "received": true })));
    }

    if let Err(err) = handle_event(db, &event).await {
        err.log_and_record(&format!("Stripe webhook {}", event.event_type));
        return Err(Status::InternalServerError);
    }

    Ok(Json(json!({ "received": true })))
}

async fn handle_event(pool: &SqlitePool, event: &WebhookEvent) -> Result<(), AppError> {
    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Processing webhook event");

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let user = resolve_checkout_user(pool, event).await?;
            let Some(user) = user else {
                tracing::warn!(event_id = %event.id, "Checkout completed for unknown user; acknowledging anyway");
                return Ok(());
            };

            if let Some(customer) = event.customer_id() {
                set_stripe_customer_id(pool, user.id, customer).await?;
            }

            let signal = StatusSignal::webhook(SubscriptionStatus::Pro, Utc::now());
            apply_status_signal(pool, user.id, &signal).await?;
            create_notification(
                pool,
                user.id,
                "billing",
                "Your subscription is active. Welcome aboard!",
            )
            .await?;
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let Some(user) = user_for_customer(pool, event).await? else {
                return Ok(());
            };

            let status = map_stripe_status(event.subscription_status().unwrap_or_default());
            let previous = user.subscription_status;

            let signal = StatusSignal::webhook(status, Utc::now());
            apply_status_signal(pool, user.id, &signal).await?;

            if previous != Some(status) {
                create_notification(
                    pool,
                    user.id,
                    "billing",
                    &format!("Your subscription status changed to {}", status),
                )
                .await?;
            }
        }
        "customer.subscription.deleted" => {
            let Some(user) = user_for_customer(pool, event).await? else {
                return Ok(());
            };

            let signal = StatusSignal::webhook(SubscriptionStatus::Cancelled, Utc::now());
            apply_status_signal(pool, user.id, &signal).await?;
            create_notification(pool, user.id, "billing", "Your subscription has ended.").await?;
        }
        _ => {}
    }

    Ok(())
}

/// Checkout sessions identify our user by `client_reference_id`, with the
/// customer email as a fallback for guest checkouts.
async fn resolve_checkout_user(
    pool: &SqlitePool,
    event: &WebhookEvent,
) -> Result<Option<User>, AppError> {
    if let Some(reference) = event.client_reference_id() {
        if let Ok(user_id) = reference.parse::<i64>() {
            match get_user(pool, user_id).await {
                Ok(user) => return Ok(Some(user)),
                Err(AppError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
    }

    let email = event
        .data
        .object
        .get("customer_email")
        .and_then(|v| v.as_str())
        .or_else(|| {
            event
                .data
                .object
                .pointer("/customer_details/email")
                .and_then(|v| v.as_str())
        });

    match email {
        Some(email) => find_user_by_email(pool, email).await,
        None => Ok(None),
    }
}

async fn user_for_customer(
    pool: &SqlitePool,
    event: &WebhookEvent,
) -> Result<Option<User>, AppError> {
    let Some(customer) = event.customer_id() else {
        tracing::warn!(event_id = %event.id, "Subscription event without a customer id");
        return Ok(None);
    };

    let user = find_user_by_customer_id(pool, customer).await?;
    if user.is_none() {
        tracing::warn!(event_id = %event.id, customer, "No user for Stripe customer; acknowledging anyway");
    }

    Ok(user)
}
