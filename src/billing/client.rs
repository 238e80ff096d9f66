use serde::Deserialize;

use crate::env::StripeConfig;
use crate::error::AppError;

/// Hand-rolled client for the handful of Stripe REST calls this service
/// makes. Requests are form-encoded with bearer auth, per Stripe's API.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub created: i64,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    data: Vec<T>,
}

/// Parameters for a subscription-mode checkout session. Exactly one of
/// `customer` / `customer_email` should normally be set; Stripe creates a
/// fresh customer when neither is.
#[derive(Debug, Default)]
pub struct CheckoutParams<'a> {
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub client_reference_id: Option<&'a str>,
    pub customer: Option<&'a str>,
    pub customer_email: Option<&'a str>,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Billing(format!(
                "Stripe returned {}: {}",
                status, body
            )));
        }

        Ok(response.json::<T>().await?)
    }

    pub async fn create_checkout_session(
        &self,
        params: CheckoutParams<'_>,
    ) -> Result<CheckoutSession, AppError> {
        let mut form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), params.price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), params.success_url.to_string()),
            ("cancel_url".to_string(), params.cancel_url.to_string()),
        ];

        if let Some(reference) = params.client_reference_id {
            form.push(("client_reference_id".to_string(), reference.to_string()));
        }
        if let Some(customer) = params.customer {
            form.push(("customer".to_string(), customer.to_string()));
        } else if let Some(email) = params.customer_email {
            form.push(("customer_email".to_string(), email.to_string()));
        }

        self.post_form("/v1/checkout/sessions", &form).await
    }

    pub async fn create_portal_session(
        &self,
        customer: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        let form = vec![
            ("customer".to_string(), customer.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];

        self.post_form("/v1/billing_portal/sessions", &form).await
    }

    pub async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<StripeCustomer>, AppError> {
        let list: ListEnvelope<StripeCustomer> = self
            .get("/v1/customers", &[("email", email), ("limit", "1")])
            .await?;

        Ok(list.data.into_iter().next())
    }

    /// The most recently created subscription for a customer, whatever its
    /// status.
    pub async fn latest_subscription(
        &self,
        customer: &str,
    ) -> Result<Option<StripeSubscription>, AppError> {
        let list: ListEnvelope<StripeSubscription> = self
            .get(
                "/v1/subscriptions",
                &[("customer", customer), ("status", "all"), ("limit", "1")],
            )
            .await?;

        Ok(list.data.into_iter().max_by_key(|s| s.created))
    }
}
