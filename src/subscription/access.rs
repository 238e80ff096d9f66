use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::SubscriptionStatus;

/// How long a checkout redirect vouches for a user before the backend has
/// confirmed anything.
pub const GRACE_PERIOD_MINUTES: i64 = 10;

pub fn grace_period() -> Duration {
    Duration::minutes(GRACE_PERIOD_MINUTES)
}

/// The single authoritative billing-confirmation state for a user.
///
/// Every writer that used to race (checkout redirect, webhook, verify poll)
/// now feeds a `StatusSignal` through `AccessState::apply`; the signal's
/// source and timestamp are persisted alongside the state so the last writer
/// is always identifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    Unknown,
    PendingConfirmation,
    ConfirmedPro,
    ConfirmedFree,
}

impl AccessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessState::Unknown => "unknown",
            AccessState::PendingConfirmation => "pending_confirmation",
            AccessState::ConfirmedPro => "confirmed_pro",
            AccessState::ConfirmedFree => "confirmed_free",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(AccessState::Unknown),
            "pending_confirmation" => Some(AccessState::PendingConfirmation),
            "confirmed_pro" => Some(AccessState::ConfirmedPro),
            "confirmed_free" => Some(AccessState::ConfirmedFree),
            _ => None,
        }
    }

    /// Advance the state machine with one observation.
    ///
    /// A checkout redirect carries no status of its own; it only moves an
    /// unconfirmed user into `pending_confirmation`. Confirmed observations
    /// come exclusively from the webhook and the verify poll. `past_due`
    /// confirms neither direction and leaves the state where it was.
    pub fn apply(self, signal: &StatusSignal) -> AccessState {
        match signal.source {
            SignalSource::CheckoutRedirect => match self {
                AccessState::ConfirmedPro => AccessState::ConfirmedPro,
                _ => AccessState::PendingConfirmation,
            },
            SignalSource::Webhook | SignalSource::Verify => match signal.status {
                Some(status) if status.is_premium() => AccessState::ConfirmedPro,
                Some(status) if status.blocks_premium_override() => AccessState::ConfirmedFree,
                _ => self,
            },
        }
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    CheckoutRedirect,
    Webhook,
    Verify,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::CheckoutRedirect => "checkout_redirect",
            SignalSource::Webhook => "webhook",
            SignalSource::Verify => "verify",
        }
    }
}

/// One observation about a user's payment state, tagged with where it came
/// from and when.
#[derive(Debug, Clone, Copy)]
pub struct StatusSignal {
    pub status: Option<SubscriptionStatus>,
    pub source: SignalSource,
    pub at: DateTime<Utc>,
}

impl StatusSignal {
    pub fn checkout_redirect(at: DateTime<Utc>) -> Self {
        Self {
            status: None,
            source: SignalSource::CheckoutRedirect,
            at,
        }
    }

    pub fn webhook(status: SubscriptionStatus, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            source: SignalSource::Webhook,
            at,
        }
    }

    pub fn verify(status: SubscriptionStatus, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            source: SignalSource::Verify,
            at,
        }
    }
}

/// The fields of a profile row that feed the access decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessSnapshot {
    pub status: Option<SubscriptionStatus>,
    pub grace_until: Option<DateTime<Utc>>,
    pub was_premium: bool,
}

/// Why access was granted. Surfaced in `/api/me` so a client can tell a
/// confirmed subscription apart from the post-checkout grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    PremiumStatus,
    GracePeriod,
    PreviouslyPremium,
}

impl AccessSnapshot {
    /// The gate decision. Deliberately biased toward false positives: a user
    /// who just paid must never be locked out while the webhook is in flight,
    /// at the accepted cost of a lapsed user keeping access until the backend
    /// explicitly reports free/cancelled.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Option<AccessReason> {
        if self.status.is_some_and(|s| s.is_premium()) {
            return Some(AccessReason::PremiumStatus);
        }

        if self.grace_until.is_some_and(|until| now <= until) {
            return Some(AccessReason::GracePeriod);
        }

        if self.was_premium && !self.status.is_some_and(|s| s.blocks_premium_override()) {
            return Some(AccessReason::PreviouslyPremium);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn premium_statuses_grant_regardless_of_grace_state() {
        for status in [
            SubscriptionStatus::Pro,
            SubscriptionStatus::Active,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::Enterprise,
        ] {
            let snapshot = AccessSnapshot {
                status: Some(status),
                grace_until: None,
                was_premium: false,
            };
            assert_eq!(
                snapshot.evaluate(now()),
                Some(AccessReason::PremiumStatus),
                "{} should grant access",
                status
            );
        }
    }

    #[test]
    fn non_premium_statuses_alone_deny() {
        for status in [
            SubscriptionStatus::Free,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Cancelled,
        ] {
            let snapshot = AccessSnapshot {
                status: Some(status),
                grace_until: None,
                was_premium: false,
            };
            assert_eq!(snapshot.evaluate(now()), None, "{} should deny", status);
        }
    }

    #[test]
    fn grace_window_grants_any_status_within_ten_minutes() {
        let stamped = now();
        for status in [None, Some(SubscriptionStatus::Free), Some(SubscriptionStatus::Cancelled)] {
            let snapshot = AccessSnapshot {
                status,
                grace_until: Some(stamped + grace_period()),
                was_premium: false,
            };
            assert_eq!(
                snapshot.evaluate(stamped + Duration::minutes(9)),
                Some(AccessReason::GracePeriod)
            );
        }
    }

    #[test]
    fn grace_window_expires_at_ten_minutes_and_one_second() {
        let stamped = now();
        let snapshot = AccessSnapshot {
            status: Some(SubscriptionStatus::Free),
            grace_until: Some(stamped + grace_period()),
            was_premium: false,
        };

        // Boundary is inclusive.
        assert_eq!(
            snapshot.evaluate(stamped + Duration::minutes(10)),
            Some(AccessReason::GracePeriod)
        );
        assert_eq!(
            snapshot.evaluate(stamped + Duration::minutes(10) + Duration::seconds(1)),
            None
        );
    }

    #[test]
    fn previously_premium_grants_unless_status_is_lapsed() {
        let allowed = AccessSnapshot {
            status: Some(SubscriptionStatus::PastDue),
            grace_until: None,
            was_premium: true,
        };
        assert_eq!(
            allowed.evaluate(now()),
            Some(AccessReason::PreviouslyPremium)
        );

        let unknown = AccessSnapshot {
            status: None,
            grace_until: None,
            was_premium: true,
        };
        assert_eq!(
            unknown.evaluate(now()),
            Some(AccessReason::PreviouslyPremium)
        );

        for status in [SubscriptionStatus::Free, SubscriptionStatus::Cancelled] {
            let blocked = AccessSnapshot {
                status: Some(status),
                grace_until: None,
                was_premium: true,
            };
            assert_eq!(blocked.evaluate(now()), None, "{} should block", status);
        }
    }

    #[test]
    fn checkout_redirect_moves_unconfirmed_states_to_pending() {
        let signal = StatusSignal::checkout_redirect(now());

        assert_eq!(
            AccessState::Unknown.apply(&signal),
            AccessState::PendingConfirmation
        );
        assert_eq!(
            AccessState::ConfirmedFree.apply(&signal),
            AccessState::PendingConfirmation
        );
        // An already-confirmed subscriber is not demoted by re-checkout.
        assert_eq!(
            AccessState::ConfirmedPro.apply(&signal),
            AccessState::ConfirmedPro
        );
    }

    #[test]
    fn confirmed_observations_settle_the_state() {
        let pro = StatusSignal::webhook(SubscriptionStatus::Pro, now());
        let free = StatusSignal::verify(SubscriptionStatus::Cancelled, now());

        assert_eq!(AccessState::Unknown.apply(&pro), AccessState::ConfirmedPro);
        assert_eq!(
            AccessState::PendingConfirmation.apply(&pro),
            AccessState::ConfirmedPro
        );
        assert_eq!(
            AccessState::ConfirmedPro.apply(&free),
            AccessState::ConfirmedFree
        );
        assert_eq!(
            AccessState::ConfirmedFree.apply(&pro),
            AccessState::ConfirmedPro
        );
    }

    #[test]
    fn past_due_leaves_the_state_in_place() {
        let signal = StatusSignal::webhook(SubscriptionStatus::PastDue, now());

        assert_eq!(
            AccessState::ConfirmedPro.apply(&signal),
            AccessState::ConfirmedPro
        );
        assert_eq!(
            AccessState::PendingConfirmation.apply(&signal),
            AccessState::PendingConfirmation
        );
        assert_eq!(AccessState::Unknown.apply(&signal), AccessState::Unknown);
    }
}
