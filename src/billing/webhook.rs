use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Signatures older than this are treated as replays.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header (`t=<timestamp>,v1=<signature>`)
/// against the raw request body.
///
/// `Err` means the header was malformed; `Ok(false)` means a well-formed
/// header whose signature did not match or whose timestamp fell outside the
/// tolerance window.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    now: i64,
) -> Result<bool, AppError> {
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;

    for part in signature_header.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::Billing("Signature header missing timestamp".to_string()))?;
    let signature = signature
        .ok_or_else(|| AppError::Billing("Signature header missing v1 signature".to_string()))?;

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::Billing("Signature timestamp is not an integer".to_string()))?;

    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Ok(false);
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC key setup failed".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let expected = hex::encode(mac.finalize().into_bytes());

    Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
}

/// The slice of the Stripe event envelope this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

pub const SUPPORTED_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
];

pub fn is_supported_event(event_type: &str) -> bool {
    SUPPORTED_EVENTS.contains(&event_type)
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(payload)
            .map_err(|e| AppError::Billing(format!("Unparseable webhook payload: {}", e)))
    }

    /// The `customer` field of the event object, when present.
    pub fn customer_id(&self) -> Option<&str> {
        self.data.object.get("customer").and_then(|v| v.as_str())
    }

    /// `client_reference_id` carries our user id through checkout.
    pub fn client_reference_id(&self) -> Option<&str> {
        self.data
            .object
            .get("client_reference_id")
            .and_then(|v| v.as_str())
    }

    /// The raw Stripe subscription status on subscription events.
    pub fn subscription_status(&self) -> Option<&str> {
        self.data.object.get("status").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = Utc::now().timestamp();
        let header = format!("t={},v1={}", now, sign(payload, SECRET, now));

        assert!(verify_signature(payload, &header, SECRET, now).unwrap());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = Utc::now().timestamp();
        let header = format!("t={},v1={}", now, sign(payload, "wrong_secret", now));

        assert!(!verify_signature(payload, &header, SECRET, now).unwrap());
    }

    #[test]
    fn modified_payload_is_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let tampered = br#"{"type":"checkout.session.completed","amount":0}"#;
        let now = Utc::now().timestamp();
        let header = format!("t={},v1={}", now, sign(payload, SECRET, now));

        assert!(!verify_signature(tampered, &header, SECRET, now).unwrap());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = Utc::now().timestamp();
        let stale = now - SIGNATURE_TOLERANCE_SECS - 1;
        let header = format!("t={},v1={}", stale, sign(payload, SECRET, stale));

        assert!(!verify_signature(payload, &header, SECRET, now).unwrap());
    }

    #[test]
    fn timestamp_within_tolerance_is_accepted() {
        let payload = br#"{}"#;
        let now = Utc::now().timestamp();
        let recent = now - SIGNATURE_TOLERANCE_SECS + 10;
        let header = format!("t={},v1={}", recent, sign(payload, SECRET, recent));

        assert!(verify_signature(payload, &header, SECRET, now).unwrap());
    }

    #[test]
    fn malformed_headers_error() {
        let now = Utc::now().timestamp();
        assert!(verify_signature(b"{}", "garbage", SECRET, now).is_err());
        assert!(verify_signature(b"{}", "t=123", SECRET, now).is_err());
        assert!(verify_signature(b"{}", "v1=abcdef", SECRET, now).is_err());
        assert!(verify_signature(b"{}", "t=notanumber,v1=abcdef", SECRET, now).is_err());
    }

    #[test]
    fn envelope_accessors_read_the_event_object() {
        let event = WebhookEvent::parse(
            br#"{
                "id": "evt_1",
                "type": "customer.subscription.updated",
                "created": 1750000000,
                "data": {"object": {"customer": "cus_123", "status": "past_due"}}
            }"#,
        )
        .unwrap();

        assert!(is_supported_event(&event.event_type));
        assert_eq!(event.customer_id(), Some("cus_123"));
        assert_eq!(event.subscription_status(), Some("past_due"));
        assert_eq!(event.client_reference_id(), None);
    }

    #[test]
    fn unsupported_events_are_flagged() {
        assert!(!is_supported_event("invoice.paid"));
        assert!(is_supported_event("checkout.session.completed"));
    }
}
