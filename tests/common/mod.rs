//! Shared fixtures for integration tests: an app state backed by the
//! in-memory customer store, plus helpers for signing webhook payloads.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use renaym_licensing::app;
use renaym_licensing::config::DuplicatePolicy;
use renaym_licensing::email::EmailService;
use renaym_licensing::license::key::KeyFormat;
use renaym_licensing::payments::StripeWebhookVerifier;
use renaym_licensing::state::AppState;
use renaym_licensing::store::{self, MemoryCustomerStore, MetadataMap};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// Default test state: replace-on-duplicate, verification-gated retrieval.
pub fn test_state() -> (AppState, MemoryCustomerStore) {
    test_state_with(DuplicatePolicy::Replace, true)
}

pub fn test_state_with(
    duplicate_policy: DuplicatePolicy,
    require_email_verification: bool,
) -> (AppState, MemoryCustomerStore) {
    let store = MemoryCustomerStore::new();
    let state = AppState {
        store: Arc::new(store.clone()),
        email: EmailService::new(
            None,
            "Renaym <licenses@renaym.test>".to_string(),
            "http://localhost:3000/retrieve-license".to_string(),
        ),
        verifier: StripeWebhookVerifier::new(TEST_WEBHOOK_SECRET.to_string()),
        key_format: Arc::new(KeyFormat::Simple),
        duplicate_policy,
        require_email_verification,
        verification_code_ttl_minutes: 15,
    };
    (state, store)
}

pub fn test_app(state: AppState) -> Router {
    app(state)
}

/// Build a `Stripe-Signature` header for `body`, timestamped now.
pub fn stripe_signature(body: &[u8]) -> String {
    let t = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(t.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes()))
}

/// A `checkout.session.completed` event body for the given purchaser.
pub fn checkout_completed_event(email: &str, plan: &str) -> Vec<u8> {
    serde_json::json!({
        "id": "evt_test_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "customer": "cus_stripe_1",
            "customer_email": email,
            "payment_status": "paid",
            "metadata": { "plan": plan }
        }}
    })
    .to_string()
    .into_bytes()
}

/// Metadata for a customer record that already holds a license.
pub fn license_metadata(key: &str, plan: &str, issued_at: &str, expires_at: &str) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    metadata.insert(store::META_LICENSE_KEY.into(), key.into());
    metadata.insert(store::META_PLAN.into(), plan.into());
    metadata.insert(store::META_ISSUED_AT.into(), issued_at.into());
    metadata.insert(store::META_EXPIRES_AT.into(), expires_at.into());
    metadata
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::http::Response<axum::body::Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as raw bytes (for comparing responses verbatim).
pub async fn body_bytes(response: axum::http::Response<axum::body::Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}
