//! Timestamp parsing and formatting shared by the fetch filter, the
//! watermark and the customer aggregator.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};

use crate::error::TimeError;

/// Cell format for every date/time value written to the tabular store.
pub const SHEET_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d",
];

pub fn parse_timezone(name: &str) -> Result<Tz, TimeError> {
    Tz::from_str(name.trim()).map_err(|_| TimeError::UnknownTimezone(name.to_string()))
}

/// Parse a wall clock timestamp. Offsets, when present, are dropped in favour
/// of the local time they annotate.
pub fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(dt) = parse_with_offset(raw) {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(raw, fmt).ok().or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

/// Parse a timestamp into the store timezone. Naive values are taken to be
/// store-local; offset-carrying values are converted.
pub fn parse_in_zone(raw: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let raw = raw.trim();
    if let Some(dt) = parse_with_offset(raw) {
        return Some(dt.with_timezone(&tz));
    }
    parse_naive(raw).map(|naive| localize(&naive, tz))
}

/// Interpret a store-local wall clock time. Ambiguous times resolve to the
/// earlier instant; times inside a DST gap are read as UTC.
pub fn localize(naive: &NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    tz.from_local_datetime(naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(naive))
}

pub fn format_sheet(naive: &NaiveDateTime) -> String {
    naive.format(SHEET_FORMAT).to_string()
}

pub fn format_sheet_opt(naive: Option<&NaiveDateTime>) -> String {
    naive.map(format_sheet).unwrap_or_default()
}

fn parse_with_offset(raw: &str) -> Option<DateTime<chrono::FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .or_else(|| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z").ok())
}

/// Serde helper: `null`, absent and unparseable timestamps all become `None`.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_naive))
}
