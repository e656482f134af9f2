//! Stripe webhook signature verification and event decoding.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use super::BillingError;

type HmacSha256 = Hmac<Sha256>;

/// Billing-relevant events. Everything else decodes to `Ignored`.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    CheckoutCompleted {
        team_id: Uuid,
        customer_id: String,
        subscription_id: Option<String>,
        plan: Option<String>,
    },
    SubscriptionUpdated {
        customer_id: String,
        subscription_id: String,
        status: String,
        price_id: Option<String>,
        current_period_end: Option<DateTime<Utc>>,
    },
    SubscriptionDeleted {
        customer_id: String,
        subscription_id: String,
    },
    Ignored(String),
}

fn signature_hex(secret: &str, timestamp: &str, payload: &[u8]) -> Result<String, BillingError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BillingError::NotConfigured(format!("webhook secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) against the
/// raw request body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<(), BillingError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| BillingError::InvalidSignature("missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(BillingError::InvalidSignature("missing v1 signature".to_string()));
    }

    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| BillingError::InvalidSignature("malformed timestamp".to_string()))?;
    let tolerance = u64::try_from(tolerance_secs).unwrap_or(0);
    if now.timestamp().abs_diff(signed_at) > tolerance {
        return Err(BillingError::InvalidSignature("timestamp outside tolerance".to_string()));
    }

    let expected = signature_hex(secret, timestamp, payload)?;
    if candidates.iter().any(|c| constant_time_eq(c, &expected)) {
        Ok(())
    } else {
        Err(BillingError::InvalidSignature("no matching signature".to_string()))
    }
}

fn text(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(String::from)
}

fn required(value: &Value, field: &str) -> Result<String, BillingError> {
    text(&value[field]).ok_or_else(|| BillingError::InvalidPayload(format!("missing '{}'", field)))
}

pub fn parse_event(payload: &[u8]) -> Result<BillingEvent, BillingError> {
    let event: Value =
        serde_json::from_slice(payload).map_err(|e| BillingError::InvalidPayload(e.to_string()))?;
    let event_type = required(&event, "type")?;
    let object = &event["data"]["object"];

    let parsed = match event_type.as_str() {
        "checkout.session.completed" => {
            let reference = required(object, "client_reference_id")?;
            let team_id = Uuid::parse_str(&reference)
                .map_err(|_| BillingError::InvalidPayload(format!("bad client_reference_id '{}'", reference)))?;
            BillingEvent::CheckoutCompleted {
                team_id,
                customer_id: required(object, "customer")?,
                subscription_id: text(&object["subscription"]),
                plan: text(&object["metadata"]["plan"]),
            }
        }
        "customer.subscription.updated" | "customer.subscription.created" => BillingEvent::SubscriptionUpdated {
            customer_id: required(object, "customer")?,
            subscription_id: required(object, "id")?,
            status: required(object, "status")?,
            price_id: text(&object["items"]["data"][0]["price"]["id"]),
            current_period_end: object["current_period_end"]
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        },
        "customer.subscription.deleted" => BillingEvent::SubscriptionDeleted {
            customer_id: required(object, "customer")?,
            subscription_id: required(object, "id")?,
        },
        _ => BillingEvent::Ignored(event_type),
    };
    Ok(parsed)
}

/// `Stripe-Signature` header value for `payload`, as Stripe would send it.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, BillingError> {
    let t = timestamp.to_string();
    Ok(format!("t={},v1={}", t, signature_hex(secret, &t, payload)?))
}
