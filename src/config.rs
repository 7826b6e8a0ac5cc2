use std::env;

use crate::error::{AppError, Result};

/// What to do when a webhook arrives for an email that already holds a
/// license. `Replace` is last-write-wins (a later purchase or redelivery
/// overwrites the stored license); `Reject` keeps the first license and
/// acknowledges the event without writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Replace,
    Reject,
}

impl DuplicatePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "replace" => Some(DuplicatePolicy::Replace),
            "reject" => Some(DuplicatePolicy::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
    /// Stripe API key for the customer store. Absent in dev mode, where the
    /// in-memory store is used instead.
    pub stripe_secret_key: Option<String>,
    /// Shared secret for webhook signature verification
    pub stripe_webhook_secret: String,
    /// Base64 Ed25519 seed; presence selects the signed license key format
    pub license_signing_key: Option<String>,
    pub duplicate_policy: DuplicatePolicy,
    /// Gate retrieval behind an emailed verification code (the default;
    /// disable only for trusted internal deployments)
    pub require_email_verification: bool,
    pub verification_code_ttl_minutes: i64,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    /// Retrieve-license page linked from the license email
    pub retrieve_page_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("RENAYM_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").ok();
        if stripe_secret_key.is_none() && !dev_mode {
            return Err(AppError::Internal(
                "STRIPE_SECRET_KEY must be set outside dev mode".into(),
            ));
        }

        let stripe_webhook_secret = match env::var("STRIPE_WEBHOOK_SECRET") {
            Ok(secret) => secret,
            Err(_) if dev_mode => "whsec_dev".to_string(),
            Err(_) => {
                return Err(AppError::Internal(
                    "STRIPE_WEBHOOK_SECRET must be set outside dev mode".into(),
                ));
            }
        };

        let duplicate_policy = env::var("LICENSE_DUPLICATE_POLICY")
            .ok()
            .map(|v| {
                DuplicatePolicy::from_str(&v).ok_or_else(|| {
                    AppError::Internal(format!(
                        "Invalid LICENSE_DUPLICATE_POLICY: {} (expected 'replace' or 'reject')",
                        v
                    ))
                })
            })
            .transpose()?
            .unwrap_or_default();

        let require_email_verification = env::var("REQUIRE_EMAIL_VERIFICATION")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let verification_code_ttl_minutes: i64 = env::var("VERIFICATION_CODE_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let retrieve_page_url = env::var("RETRIEVE_PAGE_URL")
            .unwrap_or_else(|_| format!("{}/retrieve-license", base_url));

        Ok(Self {
            host,
            port,
            dev_mode,
            stripe_secret_key,
            stripe_webhook_secret,
            license_signing_key: env::var("LICENSE_SIGNING_KEY").ok(),
            duplicate_policy,
            require_email_verification,
            verification_code_ttl_minutes,
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Renaym <licenses@renaym.com>".to_string()),
            retrieve_page_url,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
