//! Customer Record Store: the external directory that holds at most one
//! license per email, as opaque metadata on a customer record.
//!
//! The store is injected into handlers as a trait object so the production
//! Stripe-backed implementation can be swapped for the in-memory one in
//! dev mode and tests.

mod memory;
mod stripe;

pub use memory::*;
pub use stripe::*;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

/// Metadata keys this service reads and writes on customer records.
pub const META_LICENSE_KEY: &str = "license_key";
pub const META_PLAN: &str = "plan";
pub const META_ISSUED_AT: &str = "issued_at";
pub const META_EXPIRES_AT: &str = "expires_at";

/// Stored under `expires_at` for perpetual licenses.
pub const LIFETIME_SENTINEL: &str = "lifetime";

/// SHA-256 hash of the pending retrieval verification code.
pub const META_RETRIEVAL_CODE_HASH: &str = "retrieval_code_hash";
/// Unix timestamp after which the pending code is no longer accepted.
pub const META_RETRIEVAL_CODE_EXPIRES_AT: &str = "retrieval_code_expires_at";

pub type MetadataMap = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub email: String,
    pub metadata: MetadataMap,
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Look up the customer record for an email, if any.
    async fn find_by_email(&self, email: &str) -> Result<Option<CustomerRecord>>;

    /// Create a customer record carrying the given metadata.
    async fn create(&self, email: &str, metadata: MetadataMap) -> Result<CustomerRecord>;

    /// Merge `metadata` into an existing record. An empty-string value
    /// deletes that key (Stripe's own metadata convention).
    async fn update(&self, id: &str, metadata: MetadataMap) -> Result<CustomerRecord>;
}

/// Normalize an email for lookup and storage: NFKC, trimmed, lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}
