//! Stripe webhook event types and signature verification.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Reject signatures whose timestamp is further than this from now, to
/// bound replay of captured deliveries.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verifies that an inbound webhook genuinely originates from Stripe.
///
/// The `Stripe-Signature` header carries `t=<unix>,v1=<hex hmac>[,v1=...]`;
/// the signed payload is `"{t}.{raw body}"`. Verification must run on the
/// raw bytes exactly as delivered - a reserialized body will not match.
#[derive(Debug, Clone)]
pub struct StripeWebhookVerifier {
    webhook_secret: String,
    tolerance_secs: i64,
}

impl StripeWebhookVerifier {
    pub fn new(webhook_secret: String) -> Self {
        Self {
            webhook_secret,
            tolerance_secs: SIGNATURE_TOLERANCE_SECS,
        }
    }

    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<bool> {
        self.verify_at(payload, signature_header, Utc::now().timestamp())
    }

    /// Verify against an explicit clock reading. Exposed so the tolerance
    /// window is testable.
    pub fn verify_at(&self, payload: &[u8], signature_header: &str, now: i64) -> Result<bool> {
        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<Vec<u8>> = Vec::new();

        for part in signature_header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = value.parse().ok(),
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        candidates.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let Some(timestamp) = timestamp else {
            return Ok(false);
        };
        if candidates.is_empty() {
            return Ok(false);
        }
        if (now - timestamp).abs() > self.tolerance_secs {
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        Ok(candidates
            .iter()
            .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice()))))
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub metadata: StripeSessionMetadata,
}

#[derive(Debug, Deserialize)]
pub struct StripeCustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeSessionMetadata {
    #[serde(default)]
    pub plan: Option<String>,
}

impl StripeCheckoutSession {
    /// The purchaser's email: `customer_email` when set, else the email
    /// Stripe collected at checkout.
    pub fn purchaser_email(&self) -> Option<&str> {
        self.customer_email.as_deref().or_else(|| {
            self.customer_details
                .as_ref()
                .and_then(|details| details.email.as_deref())
        })
    }
}
