//! License retrieval, gated by an emailed verification code.
//!
//! The request-code step answers identically whether or not the email maps
//! to a license, and code failures are uniform across unknown emails and
//! wrong codes, so neither endpoint leaks which addresses are customers.

use axum::extract::State;
use chrono::Utc;
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::state::AppState;
use crate::store::{self, CustomerRecord, MetadataMap};

const NOT_FOUND_MESSAGE: &str = "No license found for this email address";
const INVALID_CODE_MESSAGE: &str = "Invalid or expired verification code";
const CODE_SENT_MESSAGE: &str =
    "If a license exists for this address, a verification code has been sent";

#[derive(Debug, Deserialize)]
pub struct RequestCodeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RequestCodeResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveLicenseRequest {
    pub email: String,
    #[serde(default)]
    pub verification_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseResponse {
    pub license_key: String,
    pub plan: String,
    pub issued_at: String,
    /// `null` (not omitted) for lifetime licenses
    pub expires_at: Option<String>,
}

/// Hash a verification code for storage. Codes are short-lived but still
/// never stored in the clear.
pub fn hash_retrieval_code(code: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"renaym-retrieval-code-v1:");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

fn validate_email(email: &str) -> Result<String> {
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".into()));
    }
    Ok(store::normalize_email(email))
}

/// POST /retrieve-license/request-code
pub async fn request_retrieval_code(
    State(state): State<AppState>,
    Json(request): Json<RequestCodeRequest>,
) -> Result<Json<RequestCodeResponse>> {
    let email = validate_email(&request.email)?;

    let response = RequestCodeResponse {
        message: CODE_SENT_MESSAGE,
    };

    let Some(record) = state.store.find_by_email(&email).await? else {
        return Ok(Json(response));
    };
    if !record.metadata.contains_key(store::META_LICENSE_KEY) {
        return Ok(Json(response));
    }

    let code = generate_code();
    let expires_at = Utc::now().timestamp() + state.verification_code_ttl_minutes * 60;

    // Overwrites any previous code: resending invalidates it
    let mut metadata = MetadataMap::new();
    metadata.insert(
        store::META_RETRIEVAL_CODE_HASH.into(),
        hash_retrieval_code(&code),
    );
    metadata.insert(
        store::META_RETRIEVAL_CODE_EXPIRES_AT.into(),
        expires_at.to_string(),
    );
    state.store.update(&record.id, metadata).await?;

    if let Err(e) = state
        .email
        .send_verification_code(&email, &code, state.verification_code_ttl_minutes)
        .await
    {
        tracing::warn!("Failed to send verification code email: {}", e);
    }

    Ok(Json(response))
}

/// POST /retrieve-license
///
/// Read-only: looks up the stored license and returns it verbatim. The key
/// is never regenerated on retrieval.
pub async fn retrieve_license(
    State(state): State<AppState>,
    Json(request): Json<RetrieveLicenseRequest>,
) -> Result<Json<LicenseResponse>> {
    let email = validate_email(&request.email)?;

    let record = state.store.find_by_email(&email).await?;

    let record = if state.require_email_verification {
        let code = request
            .verification_code
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("verificationCode is required".into()))?;
        verify_and_consume_code(&state, record, code).await?
    } else {
        record.ok_or_else(|| AppError::NotFound(NOT_FOUND_MESSAGE.into()))?
    };

    license_response(&record)
}

/// Check a presented code against the stored hash and consume it. Every
/// failure mode returns the same error.
async fn verify_and_consume_code(
    state: &AppState,
    record: Option<CustomerRecord>,
    code: &str,
) -> Result<CustomerRecord> {
    let invalid = || AppError::Forbidden(INVALID_CODE_MESSAGE.into());

    let record = record.ok_or_else(invalid)?;
    let expected_hash = record
        .metadata
        .get(store::META_RETRIEVAL_CODE_HASH)
        .ok_or_else(invalid)?;
    let expires_at: i64 = record
        .metadata
        .get(store::META_RETRIEVAL_CODE_EXPIRES_AT)
        .and_then(|v| v.parse().ok())
        .ok_or_else(invalid)?;

    let presented_hash = hash_retrieval_code(code);
    let matches = bool::from(presented_hash.as_bytes().ct_eq(expected_hash.as_bytes()));
    if !matches || Utc::now().timestamp() > expires_at {
        return Err(invalid());
    }

    // Single use: clear the code before disclosing anything
    let mut updates = MetadataMap::new();
    updates.insert(store::META_RETRIEVAL_CODE_HASH.into(), String::new());
    updates.insert(store::META_RETRIEVAL_CODE_EXPIRES_AT.into(), String::new());
    let record = state.store.update(&record.id, updates).await?;

    Ok(record)
}

fn license_response(record: &CustomerRecord) -> Result<Json<LicenseResponse>> {
    let metadata = &record.metadata;

    // A customer record without license metadata looks identical to no
    // record at all
    let license_key = metadata
        .get(store::META_LICENSE_KEY)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND_MESSAGE.into()))?;

    let expires_at = metadata
        .get(store::META_EXPIRES_AT)
        .filter(|v| v.as_str() != store::LIFETIME_SENTINEL)
        .cloned();

    Ok(Json(LicenseResponse {
        license_key: license_key.clone(),
        plan: metadata.get(store::META_PLAN).cloned().unwrap_or_default(),
        issued_at: metadata
            .get(store::META_ISSUED_AT)
            .cloned()
            .unwrap_or_default(),
        expires_at,
    }))
}
