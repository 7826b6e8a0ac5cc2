use std::sync::Arc;

use crate::config::{Config, DuplicatePolicy};
use crate::email::EmailService;
use crate::error::Result;
use crate::license::key::{self, KeyFormat};
use crate::payments::StripeWebhookVerifier;
use crate::store::{CustomerStore, MemoryCustomerStore, StripeCustomerStore};

/// Shared state handed to every request handler. Constructed once per
/// process; the customer store is a trait object so deployments and tests
/// can substitute implementations.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CustomerStore>,
    pub email: EmailService,
    pub verifier: StripeWebhookVerifier,
    pub key_format: Arc<KeyFormat>,
    pub duplicate_policy: DuplicatePolicy,
    pub require_email_verification: bool,
    pub verification_code_ttl_minutes: i64,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn CustomerStore> = match &config.stripe_secret_key {
            Some(secret_key) => Arc::new(StripeCustomerStore::new(secret_key.clone())),
            None => {
                tracing::warn!("No Stripe secret key configured, using in-memory customer store");
                Arc::new(MemoryCustomerStore::new())
            }
        };

        let key_format = match &config.license_signing_key {
            Some(seed) => KeyFormat::Signed(key::signing_key_from_base64(seed)?),
            None => KeyFormat::Simple,
        };

        Ok(Self {
            store,
            email: EmailService::new(
                config.resend_api_key.clone(),
                config.email_from.clone(),
                config.retrieve_page_url.clone(),
            ),
            verifier: StripeWebhookVerifier::new(config.stripe_webhook_secret.clone()),
            key_format: Arc::new(key_format),
            duplicate_policy: config.duplicate_policy,
            require_email_verification: config.require_email_verification,
            verification_code_ttl_minutes: config.verification_code_ttl_minutes,
        })
    }
}
