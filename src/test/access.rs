use chrono::{Duration, Utc};

use crate::db::{apply_status_signal, get_profile};
use crate::subscription::{
    AccessReason, AccessState, StatusSignal, SubscriptionStatus, grace_period,
};
use crate::test::utils::TestDbBuilder;

#[rocket::async_test]
async fn checkout_redirect_stamps_the_grace_period() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");
    let user_id = test_db.user_id("ella@example.com").unwrap();

    let stamped_at = Utc::now();
    let profile = apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::checkout_redirect(stamped_at),
    )
    .await
    .unwrap();

    assert_eq!(profile.access_state, AccessState::PendingConfirmation);
    assert_eq!(profile.status_source.as_deref(), Some("checkout_redirect"));

    let grace_until = profile.grace_until.expect("grace period stamped");
    let expected = stamped_at + grace_period();
    assert!((grace_until - expected).num_seconds().abs() <= 1);

    // Status is untouched; access comes from the grace window alone.
    assert_eq!(profile.subscription_status, None);
    assert_eq!(
        profile.snapshot().evaluate(stamped_at + Duration::minutes(9)),
        Some(AccessReason::GracePeriod)
    );
    assert_eq!(
        profile
            .snapshot()
            .evaluate(stamped_at + Duration::minutes(10) + Duration::seconds(1)),
        None
    );
}

#[rocket::async_test]
async fn confirmed_pro_sets_the_premium_memory() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");
    let user_id = test_db.user_id("ella@example.com").unwrap();

    let profile = apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::verify(SubscriptionStatus::Pro, Utc::now()),
    )
    .await
    .unwrap();

    assert_eq!(profile.access_state, AccessState::ConfirmedPro);
    assert!(profile.was_premium);
    assert_eq!(profile.status_source.as_deref(), Some("verify"));
    assert_eq!(
        profile.snapshot().evaluate(Utc::now()),
        Some(AccessReason::PremiumStatus)
    );
}

#[rocket::async_test]
async fn confirmed_free_revokes_the_override_for_good() {
    let test_db = TestDbBuilder::new()
        .subscriber("ella@example.com", None, SubscriptionStatus::Pro)
        .build()
        .await
        .expect("Failed to build test DB");
    let user_id = test_db.user_id("ella@example.com").unwrap();

    // Confirmed premium first.
    let profile = get_profile(&test_db.pool, user_id).await.unwrap();
    assert!(profile.was_premium);

    // Backend explicitly reports cancelled.
    let profile = apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::verify(SubscriptionStatus::Cancelled, Utc::now()),
    )
    .await
    .unwrap();

    assert_eq!(profile.access_state, AccessState::ConfirmedFree);
    assert!(!profile.was_premium);
    assert_eq!(profile.snapshot().evaluate(Utc::now()), None);

    // Even if the status later becomes unreadable, the override must not
    // come back.
    let mut snapshot = profile.snapshot();
    snapshot.status = None;
    assert_eq!(snapshot.evaluate(Utc::now()), None);
}

#[rocket::async_test]
async fn past_due_keeps_a_confirmed_subscriber_in() {
    let test_db = TestDbBuilder::new()
        .subscriber("ella@example.com", None, SubscriptionStatus::Pro)
        .build()
        .await
        .expect("Failed to build test DB");
    let user_id = test_db.user_id("ella@example.com").unwrap();

    let profile = apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::webhook(SubscriptionStatus::PastDue, Utc::now()),
    )
    .await
    .unwrap();

    assert_eq!(profile.subscription_status, Some(SubscriptionStatus::PastDue));
    assert_eq!(profile.access_state, AccessState::ConfirmedPro);
    assert!(profile.was_premium);
    assert_eq!(
        profile.snapshot().evaluate(Utc::now()),
        Some(AccessReason::PreviouslyPremium)
    );
}

#[rocket::async_test]
async fn later_signals_overwrite_earlier_ones() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");
    let user_id = test_db.user_id("ella@example.com").unwrap();

    let first = Utc::now();
    apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::webhook(SubscriptionStatus::Pro, first),
    )
    .await
    .unwrap();

    let second = first + Duration::seconds(30);
    let profile = apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::verify(SubscriptionStatus::Free, second),
    )
    .await
    .unwrap();

    // Whichever writer ran last owns the row.
    assert_eq!(profile.subscription_status, Some(SubscriptionStatus::Free));
    assert_eq!(profile.status_source.as_deref(), Some("verify"));
    assert_eq!(profile.access_state, AccessState::ConfirmedFree);
    let recorded = profile.status_updated_at.unwrap();
    assert!((recorded - second).num_seconds().abs() <= 1);
}

#[rocket::async_test]
async fn re_subscribing_after_cancellation_recovers() {
    let test_db = TestDbBuilder::new()
        .user("ella@example.com", None)
        .build()
        .await
        .expect("Failed to build test DB");
    let user_id = test_db.user_id("ella@example.com").unwrap();

    apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::webhook(SubscriptionStatus::Cancelled, Utc::now()),
    )
    .await
    .unwrap();

    // New checkout: grace period bridges the webhook gap again.
    let profile = apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::checkout_redirect(Utc::now()),
    )
    .await
    .unwrap();
    assert_eq!(profile.access_state, AccessState::PendingConfirmation);
    assert_eq!(
        profile.snapshot().evaluate(Utc::now()),
        Some(AccessReason::GracePeriod)
    );

    let profile = apply_status_signal(
        &test_db.pool,
        user_id,
        &StatusSignal::webhook(SubscriptionStatus::Pro, Utc::now()),
    )
    .await
    .unwrap();
    assert_eq!(profile.access_state, AccessState::ConfirmedPro);
    assert_eq!(
        profile.snapshot().evaluate(Utc::now()),
        Some(AccessReason::PremiumStatus)
    );
}
