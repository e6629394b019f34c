//! Timestamp formats found in upstream exports.
//!
//! | Source | Example | Result |
//! |--------|---------|--------|
//! | table exports | `2025-01-07 00:00:01.000 Asia/Seoul` | wall clock, zone label dropped |
//! | price logs | `2025-01-06T15:00:01.000Z` | shifted into the KST (+09:00) wall clock |
//! | order items | `2025-01-07 00:00:01.000` | as written |
//!
//! An empty export timestamp is [`epoch`].

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use pricewatch_core::event::{epoch, Timestamp};

const WALL_CLOCK: &str = "%Y-%m-%d %H:%M:%S%.f";
const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Parse `YYYY-MM-DD hh:mm:ss[.fff] [<zone>]`, dropping the zone label.
pub fn parse_export_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(epoch());
    }
    parse_wall_clock(raw).or_else(|| {
        let (wall, _zone) = raw.rsplit_once(' ')?;
        parse_wall_clock(wall)
    })
}

/// Parse `YYYY-MM-DD hh:mm:ss[.fff]`.
pub fn parse_wall_clock(raw: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(raw.trim(), WALL_CLOCK).ok()
}

/// Parse an RFC 3339 log timestamp into the KST wall clock.
///
/// Values without an offset are taken as already local.
pub fn parse_log_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    let kst = FixedOffset::east_opt(KST_OFFSET_SECS)?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&kst).naive_local()),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .or_else(|| parse_wall_clock(raw)),
    }
}
