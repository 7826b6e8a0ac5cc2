//! License key codec.
//!
//! Two formats are in circulation and both stay supported indefinitely:
//!
//! 1. Simple: `RENAYM-AAAAA-BBBBB-CCCCC-DDDDD`, four 5-character uppercase
//!    segments drawn from OS randomness. No embedded semantics; the issuing
//!    system remains the source of truth.
//! 2. Signed: `base64url(JSON payload).base64url(signature)`, an Ed25519
//!    signature over the encoded payload. Self-verifying with the public
//!    key, so offline activation needs no network call.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;

use super::LicensePayload;
use crate::error::{AppError, Result};

/// Product prefix for simple-format keys.
pub const KEY_PREFIX: &str = "RENAYM";

const SEGMENT_COUNT: usize = 4;
const SEGMENT_LEN: usize = 5;
// 4 random bytes per segment, 16 total across the key
const SEGMENT_RANDOM_BYTES: usize = 4;

/// Which key format new licenses are issued in. Chosen by configuration;
/// issued keys never migrate between formats.
#[derive(Clone)]
pub enum KeyFormat {
    Simple,
    Signed(SigningKey),
}

impl KeyFormat {
    pub fn generate(&self, payload: &LicensePayload) -> Result<String> {
        match self {
            KeyFormat::Simple => Ok(generate_simple_key()),
            KeyFormat::Signed(signing_key) => generate_signed_key(payload, signing_key),
        }
    }
}

/// Generate a simple-format key from the OS CSPRNG.
pub fn generate_simple_key() -> String {
    let mut segments = Vec::with_capacity(SEGMENT_COUNT);
    for _ in 0..SEGMENT_COUNT {
        let mut bytes = [0u8; SEGMENT_RANDOM_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let mut segment = hex::encode_upper(bytes);
        segment.truncate(SEGMENT_LEN);
        segments.push(segment);
    }
    format!("{}-{}", KEY_PREFIX, segments.join("-"))
}

/// Generate a signed-format key. The signature covers the base64url-encoded
/// payload bytes, so verifiers never re-serialize the JSON.
pub fn generate_signed_key(payload: &LicensePayload, signing_key: &SigningKey) -> Result<String> {
    let json = serde_json::to_vec(payload)?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(json);
    let signature = signing_key.sign(payload_b64.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
    Ok(format!("{}.{}", payload_b64, sig_b64))
}

/// Verify a signed-format key and return its payload.
pub fn verify_signed_key(key: &str, verifying_key: &VerifyingKey) -> Result<LicensePayload> {
    let (payload_b64, sig_b64) = key
        .split_once('.')
        .ok_or_else(|| AppError::BadRequest("Malformed license key".into()))?;

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| AppError::BadRequest("Malformed license key".into()))?;
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|_| AppError::BadRequest("Malformed license key".into()))?;

    verifying_key
        .verify(payload_b64.as_bytes(), &signature)
        .map_err(|_| AppError::Forbidden("Invalid license signature".into()))?;

    let json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::BadRequest("Malformed license key".into()))?;
    serde_json::from_slice(&json)
        .map_err(|_| AppError::BadRequest("Malformed license payload".into()))
}

/// Shape check accepting either key format. Pure and total; performs no
/// signature verification.
pub fn is_valid_format(key: &str) -> bool {
    if key.contains('.') {
        is_valid_signed_shape(key)
    } else {
        is_valid_simple_shape(key)
    }
}

fn is_valid_simple_shape(key: &str) -> bool {
    let mut parts = key.split('-');
    if parts.next() != Some(KEY_PREFIX) {
        return false;
    }

    let mut count = 0;
    for segment in parts {
        count += 1;
        if segment.len() != SEGMENT_LEN
            || !segment
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return false;
        }
    }
    count == SEGMENT_COUNT
}

fn is_valid_signed_shape(key: &str) -> bool {
    let Some((payload, signature)) = key.split_once('.') else {
        return false;
    };
    // Exactly two dot-separated, non-empty base64url segments
    !signature.contains('.') && is_base64url(payload) && is_base64url(signature)
}

fn is_base64url(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Generate a fresh Ed25519 keypair for the signed format.
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Decode a base64-encoded 32-byte Ed25519 seed (as produced by `keygen`).
pub fn signing_key_from_base64(encoded: &str) -> Result<SigningKey> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AppError::Internal("Invalid signing key encoding".into()))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| AppError::Internal("Signing key must be 32 bytes".into()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Encode a signing key seed for storage in the environment.
pub fn signing_key_to_base64(signing_key: &SigningKey) -> String {
    STANDARD.encode(signing_key.to_bytes())
}

/// Encode a verifying key for distribution to the desktop app.
pub fn verifying_key_to_base64(verifying_key: &VerifyingKey) -> String {
    STANDARD.encode(verifying_key.to_bytes())
}
