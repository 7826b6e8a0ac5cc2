//! License issuance: the Stripe webhook handler.
//!
//! Terminal outcomes and their responses:
//! - missing/invalid signature -> 400, nothing else happens
//! - irrelevant event type, unpaid session, missing email/plan -> 200 so
//!   Stripe stops redelivering an event we will never act on
//! - persistence failure -> 500 to invite redelivery (the upsert is
//!   idempotent, so a retry is safe)
//! - everything after persistence (email) -> 200 regardless; retrieval is
//!   the recovery path if the notification is lost

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{SecondsFormat, Utc};

use crate::config::DuplicatePolicy;
use crate::license::{LicensePayload, Plan, expiry};
use crate::payments::{StripeCheckoutSession, StripeWebhookEvent};
use crate::state::AppState;
use crate::store::{self, MetadataMap};

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = match headers.get("stripe-signature") {
        Some(sig) => match sig.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => return (StatusCode::BAD_REQUEST, "Invalid signature header"),
        },
        None => return (StatusCode::BAD_REQUEST, "Missing stripe-signature header"),
    };

    // Verify the raw bytes before anything is parsed or trusted
    match state.verifier.verify(&body, &signature) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::BAD_REQUEST, "Invalid signature"),
        Err(e) => {
            tracing::error!("Signature verification error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signature verification failed",
            );
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse verified webhook body: {}", e);
            return (StatusCode::OK, "Malformed event");
        }
    };

    if event.event_type != "checkout.session.completed" {
        return (StatusCode::OK, "Event ignored");
    }

    handle_checkout_completed(state, &event).await
}

async fn handle_checkout_completed(
    state: AppState,
    event: &StripeWebhookEvent,
) -> (StatusCode, &'static str) {
    let session: StripeCheckoutSession = match serde_json::from_value(event.data.object.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(event_id = %event.id, "Failed to parse checkout session: {}", e);
            return (StatusCode::OK, "Malformed event");
        }
    };

    let Some(email) = session.purchaser_email() else {
        tracing::error!(session_id = %session.id, "Missing customer email in session");
        return (StatusCode::OK, "Missing purchaser details");
    };
    let Some(plan_str) = session.metadata.plan.as_deref() else {
        tracing::error!(session_id = %session.id, "Missing plan in session metadata");
        return (StatusCode::OK, "Missing purchaser details");
    };
    let Ok(plan) = plan_str.parse::<Plan>() else {
        tracing::error!(session_id = %session.id, plan = %plan_str, "Unknown plan in session metadata");
        return (StatusCode::OK, "Missing purchaser details");
    };

    if session.payment_status != "paid" {
        return (StatusCode::OK, "Payment not completed");
    }

    let email = store::normalize_email(email);
    let issued_at = Utc::now();
    let expires_at = expiry::expires_at(plan, issued_at);

    let payload = LicensePayload {
        email: email.clone(),
        plan,
        issued_at,
        expires_at,
    };
    let license_key = match state.key_format.generate(&payload) {
        Ok(key) => key,
        Err(e) => {
            tracing::error!("Failed to generate license key: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate license",
            );
        }
    };

    let mut metadata = MetadataMap::new();
    metadata.insert(store::META_LICENSE_KEY.into(), license_key.clone());
    metadata.insert(store::META_PLAN.into(), plan.as_str().into());
    metadata.insert(
        store::META_ISSUED_AT.into(),
        issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    metadata.insert(
        store::META_EXPIRES_AT.into(),
        expires_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| store::LIFETIME_SENTINEL.to_string()),
    );

    let existing = match state.store.find_by_email(&email).await {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Customer lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Store error");
        }
    };

    match existing {
        Some(record) => {
            if state.duplicate_policy == DuplicatePolicy::Reject
                && record.metadata.contains_key(store::META_LICENSE_KEY)
            {
                tracing::info!(
                    event_id = %event.id,
                    "Customer already licensed, keeping existing license (duplicate policy: reject)"
                );
                return (StatusCode::OK, "Already licensed");
            }
            if let Err(e) = state.store.update(&record.id, metadata).await {
                tracing::error!("Failed to update customer license metadata: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Store error");
            }
        }
        None => {
            if let Err(e) = state.store.create(&email, metadata).await {
                tracing::error!("Failed to create customer record: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Store error");
            }
        }
    }

    // The license exists once persisted; a failed email never rolls it back
    if let Err(e) = state.email.send_license_key(&email, &license_key, plan).await {
        tracing::warn!("Failed to send license email: {}", e);
    }

    tracing::info!(
        event_id = %event.id,
        session_id = %session.id,
        plan = %plan.as_str(),
        "License issued"
    );

    (StatusCode::OK, "OK")
}
