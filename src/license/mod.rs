//! License domain types: plans, the signed-key payload, and the codec.

pub mod expiry;
pub mod key;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sellable plans. The authoritative source for a license's plan is the
/// checkout session metadata, never user input.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
pub enum Plan {
    #[serde(rename = "annual")]
    #[strum(serialize = "annual")]
    Annual,
    #[serde(rename = "2year")]
    #[strum(serialize = "2year")]
    TwoYear,
    #[serde(rename = "lifetime")]
    #[strum(serialize = "lifetime")]
    Lifetime,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Annual => "annual",
            Plan::TwoYear => "2year",
            Plan::Lifetime => "lifetime",
        }
    }

    /// License duration in whole calendar years. 0 = perpetual.
    pub fn duration_years(&self) -> u32 {
        match self {
            Plan::Annual => 1,
            Plan::TwoYear => 2,
            Plan::Lifetime => 0,
        }
    }
}

/// The payload embedded in signed license keys. Also the record of what was
/// issued: licenseKey and expiresAt are derived from (email, plan, issuedAt)
/// exactly once, at issuance time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensePayload {
    pub email: String,
    pub plan: Plan,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
