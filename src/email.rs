//! Email delivery for license keys and retrieval verification codes.
//!
//! Two modes:
//! 1. Send via Resend API (when an API key is configured)
//! 2. Log only (no API key; the message body is traced instead, which is
//!    what local development uses)
//!
//! Delivery is fire-and-forget from the issuance handler's perspective: a
//! failed send never rolls back a persisted license.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::license::Plan;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Result of attempting to send an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Email was sent via Resend
    Sent,
    /// No API key configured; the message was logged instead
    LogOnly,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// Email service using the Resend API.
#[derive(Clone)]
pub struct EmailService {
    api_key: Option<String>,
    from_email: String,
    /// Shown in the license email so purchasers can recover their key later
    retrieve_url: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String, retrieve_url: String) -> Self {
        Self {
            api_key,
            from_email,
            retrieve_url,
            http_client: Client::new(),
        }
    }

    /// Send the purchaser their license key with activation instructions.
    pub async fn send_license_key(
        &self,
        to_email: &str,
        license_key: &str,
        plan: Plan,
    ) -> Result<EmailSendResult> {
        let subject = format!("Your Renaym {} license key", plan.as_str());
        let text = format!(
            "Thank you for purchasing Renaym {plan}!\n\n\
             Your license key:\n\n{key}\n\n\
             To activate:\n\
             1. Open Renaym\n\
             2. Go to Settings\n\
             3. Enter your license key\n\
             4. Click Activate\n\n\
             You can retrieve your license key anytime at {url}\n\n\
             Thank you for your support!\n- The Renaym Team\n",
            plan = plan.as_str(),
            key = license_key,
            url = self.retrieve_url,
        );

        self.deliver(to_email, &subject, &text).await
    }

    /// Send a short-lived retrieval verification code.
    pub async fn send_verification_code(
        &self,
        to_email: &str,
        code: &str,
        expires_in_minutes: i64,
    ) -> Result<EmailSendResult> {
        let subject = "Your Renaym license retrieval code";
        let text = format!(
            "Your verification code: {code}\n\n\
             Enter this code on the retrieve-license page to view your \
             license key. It expires in {minutes} minutes and can be used \
             once.\n\n\
             If you didn't request this, you can ignore this email.\n",
            code = code,
            minutes = expires_in_minutes,
        );

        self.deliver(to_email, subject, &text).await
    }

    async fn deliver(&self, to_email: &str, subject: &str, text: &str) -> Result<EmailSendResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::info!(
                to = %to_email,
                subject = %subject,
                "No email API key configured, logging message instead:\n{}",
                text
            );
            return Ok(EmailSendResult::LogOnly);
        };

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![to_email],
            subject,
            text,
        };

        let response = self
            .http_client
            .post(RESEND_API_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                AppError::Internal(format!("Email service error: {}", e))
            })?;

        if response.status().is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                AppError::Internal("Email service response error".into())
            })?;

            tracing::info!(to = %to_email, "Email sent via Resend");
            Ok(EmailSendResult::Sent)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Resend API returned error");
            Err(AppError::Internal(format!(
                "Email service error: {} - {}",
                status, body
            )))
        }
    }
}
