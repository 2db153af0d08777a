// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, SecondsFormat, Utc};

/// India Standard Time offset in seconds (UTC+05:30).
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The homestay's local offset. Stay dates and refund dates are calendar
/// dates in this zone.
pub fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or(Utc.fix())
}

/// Today's calendar date at the homestay.
pub fn local_today() -> NaiveDate {
    local_date(Utc::now())
}

/// Calendar date of a UTC instant at the homestay.
pub fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&local_offset()).date_naive()
}
