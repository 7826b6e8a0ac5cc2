//! Expiry policy: pure mapping from (plan, issuance instant) to an
//! expiration instant.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use super::Plan;

/// Compute when a license issued at `issued_at` expires.
///
/// Uses calendar-year arithmetic (same month and day, year advanced by the
/// plan's duration) rather than elapsed seconds, matching billing-cycle
/// expectations. Returns `None` for perpetual plans.
pub fn expires_at(plan: Plan, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let years = plan.duration_years();
    if years == 0 {
        return None;
    }

    let date = issued_at.date_naive();
    let target_year = date.year() + years as i32;

    // Feb 29 issued licenses land on Mar 1 in non-leap target years.
    let expiry_date = NaiveDate::from_ymd_opt(target_year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(target_year, 3, 1))
        .unwrap_or(date);

    Some(expiry_date.and_time(issued_at.time()).and_utc())
}
