use serde::Serialize;

use crate::subscription::SubscriptionStatus;

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub subscription_status: Option<SubscriptionStatus>,
    pub stripe_customer_id: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub subscription_status: Option<String>,
    pub stripe_customer_id: Option<String>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            display_name: user.display_name.unwrap_or_default(),
            subscription_status: user
                .subscription_status
                .as_deref()
                .and_then(SubscriptionStatus::parse),
            stripe_customer_id: user.stripe_customer_id,
        }
    }
}

impl User {
    pub fn status_str(&self) -> &'static str {
        self.subscription_status
            .map(|s| s.as_str())
            .unwrap_or("free")
    }
}
