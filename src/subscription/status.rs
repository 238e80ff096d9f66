use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription status as the application understands it. The raw Stripe
/// vocabulary never leaves the billing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Free,
    Pro,
    Active,
    Trialing,
    PastDue,
    Cancelled,
    Enterprise,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Pro => "pro",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Enterprise => "enterprise",
        }
    }

    /// None for anything outside the app vocabulary; an unknown stored value
    /// counts as neither premium nor explicitly lapsed.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(SubscriptionStatus::Free),
            "pro" => Some(SubscriptionStatus::Pro),
            "active" => Some(SubscriptionStatus::Active),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "enterprise" => Some(SubscriptionStatus::Enterprise),
            _ => None,
        }
    }

    pub fn is_premium(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Pro
                | SubscriptionStatus::Active
                | SubscriptionStatus::Trialing
                | SubscriptionStatus::Enterprise
        )
    }

    /// Statuses that revoke the previously-premium override. `past_due` is
    /// deliberately absent: a lapsed payment keeps the user in until an
    /// explicit free/cancelled observation.
    pub fn blocks_premium_override(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Free | SubscriptionStatus::Cancelled
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a raw Stripe subscription status into the app vocabulary.
///
/// Unrecognized Stripe statuses fall back to `pro`: the mapping fails open so
/// a new Stripe status never locks out a paying customer.
pub fn map_stripe_status(stripe_status: &str) -> SubscriptionStatus {
    match stripe_status {
        "active" | "trialing" => SubscriptionStatus::Pro,
        "canceled" | "unpaid" | "incomplete_expired" => SubscriptionStatus::Cancelled,
        "past_due" | "incomplete" => SubscriptionStatus::PastDue,
        _ => SubscriptionStatus::Pro,
    }
}
