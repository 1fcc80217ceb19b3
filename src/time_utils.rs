// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.
//!
//! All day-level keys are UTC calendar dates; activities and metrics are
//! bucketed by the UTC day they fall on.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// UTC calendar day of a timestamp (the `YYYY-MM-DD` bucket key).
pub fn utc_day(date: DateTime<Utc>) -> NaiveDate {
    date.date_naive()
}

/// Midnight UTC of a calendar day.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Last instant of a calendar day (23:59:59.999 UTC).
///
/// Used to normalize range ends so a date-only end covers its full day.
pub fn day_end(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_milli_opt(23, 59, 59, 999).unwrap_or_default())
}
