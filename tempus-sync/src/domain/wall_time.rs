//! Conversion between naive local wall-clock strings and UTC instants.
//!
//! A naive string is meaningless until paired with an IANA zone; the zone
//! table comes from `chrono-tz`, so DST rules are authoritative rather than
//! guessed. Fails closed: an unrecognized zone is an error, never a silent
//! fall-back to UTC.

use std::str::FromStr;

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::domain::SyncError;

const WALL_FORMAT: &str = "%Y-%m-%dT%H:%M";
const WALL_FORMAT_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

/// Interpret `raw` in `zone` and return the corresponding UTC instant.
///
/// A string that already carries an offset (`Z` or `+hh:mm`) claims to be
/// absolute and passes through unchanged. A wall time skipped by a forward
/// DST transition fails with `InvalidTimestamp`; a repeated wall time on a
/// fall-back day resolves deterministically to the earlier instant.
pub fn to_instant(raw: &str, zone: &str) -> Result<DateTime<Utc>, SyncError> {
    let raw = raw.trim();

    // Already absolute: identity. RFC 3339 proper requires seconds, but a
    // minute-precision string with an explicit suffix still claims to be
    // absolute, so it passes through as well.
    if let Ok(absolute) = DateTime::parse_from_rfc3339(raw) {
        return Ok(absolute.with_timezone(&Utc));
    }
    if let Some(stripped) = raw.strip_suffix('Z') {
        if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, WALL_FORMAT) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(absolute) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Ok(absolute.with_timezone(&Utc));
    }

    let naive = parse_naive(raw)?;
    let tz = parse_zone(zone)?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.with_timezone(&Utc)),
        // Fall-back overlap: both instants share the calendar day; taking
        // the earlier one keeps the choice deterministic.
        LocalResult::Ambiguous(earlier, _later) => Ok(earlier.with_timezone(&Utc)),
        LocalResult::None => Err(SyncError::InvalidTimestamp(format!(
            "{} does not exist in {} (skipped by a DST transition)",
            raw, zone
        ))),
    }
}

/// Inverse of `to_instant`: format an instant as the zone's wall clock,
/// minute precision.
pub fn to_wall(instant: &DateTime<Utc>, zone: &str) -> Result<String, SyncError> {
    let tz = parse_zone(zone)?;
    Ok(instant.with_timezone(&tz).format(WALL_FORMAT).to_string())
}

fn parse_naive(raw: &str) -> Result<NaiveDateTime, SyncError> {
    NaiveDateTime::parse_from_str(raw, WALL_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, WALL_FORMAT_SECONDS))
        .map_err(|_| {
            SyncError::InvalidTimestamp(format!(
                "{:?} is not a YYYY-MM-DDTHH:MM wall time or RFC 3339 instant",
                raw
            ))
        })
}

fn parse_zone(zone: &str) -> Result<Tz, SyncError> {
    Tz::from_str(zone.trim()).map_err(|_| SyncError::UnknownTimezone(zone.to_string()))
}
