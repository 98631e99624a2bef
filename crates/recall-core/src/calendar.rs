//! Day-granular time helpers.
//!
//! Every calendar computation in Recall is done in UTC: a "day" is a UTC date
//! and the end of a day is 23:59:59.999 UTC.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

/// The UTC calendar date of `at`.
pub fn utc_date(at: DateTime<Utc>) -> NaiveDate { at.date_naive() }

/// The last representable millisecond of `date`.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
  date
    .and_hms_milli_opt(23, 59, 59, 999)
    .map_or(DateTime::<Utc>::MAX_UTC, |dt| dt.and_utc())
}

/// End of the UTC day that is `days` after the date of `at`.
pub fn end_of_day_after(at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
  let date = utc_date(at)
    .checked_add_days(Days::new(u64::from(days)))
    .unwrap_or(NaiveDate::MAX);
  end_of_day(date)
}

/// Whole days from `earlier` to `later`; negative if `later` is before.
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
  (later - earlier).num_days()
}

/// Parse a timestamp from a storage or transport boundary.
///
/// Accepts RFC 3339 and the `+00:00Z` suffix some backends emit. Returns
/// `None` rather than an error; the caller decides how to surface it.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  let normalised = raw.trim().replace("+00:00Z", "Z");
  DateTime::parse_from_rfc3339(&normalised)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter for `Option<DateTime<Utc>>` fields that must survive
/// malformed input. Anything that is not a parseable timestamp string
/// deserialises as `None`.
pub fn lenient_timestamp<'de, D>(
  deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = serde_json::Value::deserialize(deserializer)?;
  Ok(value.as_str().and_then(parse_timestamp))
}
