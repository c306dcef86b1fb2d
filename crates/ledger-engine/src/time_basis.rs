//! Conversions between UTC instants and a fixed local offset.
//!
//! Everything here is pure: there is no system clock access and no timezone
//! database. A [`LocalOffset`] is a constant number of minutes east of UTC and
//! is never adjusted for daylight saving time.
//!
//! # Functions
//!
//! - [`to_local`] — UTC instant → local wall-clock timestamp
//! - [`local_calendar_date`] — local timestamp → calendar date
//! - [`parse_instant`] / [`format_instant`] — canonical string form of an instant
//!
//! Instants are held at millisecond precision, the precision of the canonical
//! string form, so formatting and parsing back always yields the same value.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// An absolute point in time, always held in UTC.
pub type Instant = DateTime<Utc>;

/// A local calendar day, meaningful only together with a [`LocalOffset`].
pub type CalendarDate = NaiveDate;

/// Largest accepted offset magnitude, exclusive (chrono `FixedOffset` range).
const MAX_OFFSET_MINUTES: i32 = 24 * 60;

/// Years a parsed instant may fall in: the four-digit years of RFC 3339.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

// ── LocalOffset ─────────────────────────────────────────────────────────────

/// A fixed signed offset from UTC in whole minutes (e.g. `+480` for UTC+8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct LocalOffset {
    minutes: i32,
}

impl LocalOffset {
    pub const UTC: LocalOffset = LocalOffset { minutes: 0 };

    /// Build an offset from signed minutes east of UTC.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidOffset`] if `|minutes|` is 24 hours or more.
    pub fn from_minutes(minutes: i32) -> Result<Self, LedgerError> {
        if minutes.unsigned_abs() >= MAX_OFFSET_MINUTES.unsigned_abs() {
            return Err(LedgerError::InvalidOffset(format!(
                "{minutes} minutes is outside ±24h"
            )));
        }
        Ok(Self { minutes })
    }

    pub fn minutes(self) -> i32 {
        self.minutes
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }
}

impl fmt::Display for LocalOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minutes >= 0 { '+' } else { '-' };
        let abs = self.minutes.unsigned_abs();
        write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)
    }
}

/// Accepts `Z`, `+08:00`, `-0530`, `+08`, or a bare minute count such as `+480`.
///
/// Four bare digits are always read as `HHMM`.
impl FromStr for LocalOffset {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || LedgerError::InvalidOffset(format!("'{s}'"));

        if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
            return Ok(Self::UTC);
        }

        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1i64, &s[1..]),
            Some(b'-') => (-1i64, &s[1..]),
            Some(b'0'..=b'9') => (1i64, s),
            _ => return Err(invalid()),
        };
        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit() || c == ':') {
            return Err(invalid());
        }

        // Digit runs can be arbitrarily long, so the arithmetic stays checked.
        let hours_minutes = |h: &str, m: &str| -> Option<i64> {
            let h: i64 = h.parse().ok()?;
            let m: i64 = m.parse().ok()?;
            if m >= 60 {
                return None;
            }
            h.checked_mul(60)?.checked_add(m)
        };

        let minutes = if let Some((h, m)) = rest.split_once(':') {
            hours_minutes(h, m)
        } else {
            match rest.len() {
                // "+08"
                1 | 2 => hours_minutes(rest, "0"),
                // "-0530"
                4 => hours_minutes(&rest[..2], &rest[2..]),
                // "+480"
                _ => rest.parse::<i64>().ok(),
            }
        }
        .ok_or_else(invalid)?;

        let signed = i32::try_from(sign * minutes).map_err(|_| {
            LedgerError::InvalidOffset(format!("'{s}' is outside ±24h"))
        })?;
        Self::from_minutes(signed)
    }
}

impl Serialize for LocalOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LocalOffset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Minutes(i32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Minutes(m) => LocalOffset::from_minutes(m).map_err(serde::de::Error::custom),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ── Conversions ─────────────────────────────────────────────────────────────

/// Express a UTC instant as local wall-clock time under `offset`.
///
/// Saturates at chrono's representable limits instead of overflowing; any
/// instant produced by [`parse_instant`] is far from them.
///
/// # Examples
///
/// ```
/// use ledger_engine::time_basis::{parse_instant, to_local, LocalOffset};
///
/// let instant = parse_instant("2024-01-15T18:00:00Z").unwrap();
/// let local = to_local(instant, LocalOffset::from_minutes(480).unwrap());
/// assert_eq!(local.to_string(), "2024-01-16 02:00:00");
/// ```
pub fn to_local(instant: Instant, offset: LocalOffset) -> NaiveDateTime {
    instant
        .naive_utc()
        .checked_add_signed(offset.as_duration())
        .unwrap_or(if offset.minutes >= 0 {
            NaiveDateTime::MAX
        } else {
            NaiveDateTime::MIN
        })
}

/// The calendar date of a local wall-clock timestamp.
pub fn local_calendar_date(local: NaiveDateTime) -> CalendarDate {
    local.date()
}

/// Drop everything below the millisecond.
pub fn truncate_to_millis(instant: Instant) -> Instant {
    instant.trunc_subsecs(3)
}

/// Parse an instant from an RFC 3339 string (any offset, normalized to UTC).
///
/// A zone-less ISO 8601 date-time (`2024-01-15T18:00:00`, optional fraction)
/// is read as UTC, which is how the upstream source exports timestamps.
/// Digits below the millisecond are dropped.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidDatetime`] if the string matches neither form,
/// or if the instant falls outside years 0001–9999 (UTC).
pub fn parse_instant(s: &str) -> Result<Instant, LedgerError> {
    let trimmed = s.trim();
    let instant = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| LedgerError::InvalidDatetime(format!("'{s}': {e}")))?,
    };
    if !(MIN_YEAR..=MAX_YEAR).contains(&instant.year()) {
        return Err(LedgerError::InvalidDatetime(format!(
            "'{s}': year {} is outside {MIN_YEAR:04}–{MAX_YEAR}",
            instant.year()
        )));
    }
    Ok(truncate_to_millis(instant))
}

/// Canonical string form: RFC 3339, millisecond precision, `Z` suffix.
pub fn format_instant(instant: Instant) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format a local timestamp as `YYYY-MM-DDTHH:MM:SS` (no offset suffix).
pub fn format_local(local: NaiveDateTime) -> String {
    local.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Serde adapter that writes instants in the canonical millisecond form.
///
/// Use with `#[serde(with = "ledger_engine::time_basis::canonical")]`.
pub mod canonical {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_instant, parse_instant, Instant};

    pub fn serialize<S: Serializer>(instant: &Instant, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_instant(*instant))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Instant, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_instant(&s).map_err(serde::de::Error::custom)
    }

    /// The same adapter for `Option<Instant>`; `None` is written as `null`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::{format_instant, parse_instant, Instant};

        pub fn serialize<S: Serializer>(
            instant: &Option<Instant>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match instant {
                Some(i) => serializer.serialize_some(&format_instant(*i)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Instant>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| parse_instant(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn plus8() -> LocalOffset {
        LocalOffset::from_minutes(480).unwrap()
    }

    #[test]
    fn test_to_local_crosses_midnight() {
        let instant = parse_instant("2024-01-15T18:00:00Z").unwrap();
        let local = to_local(instant, plus8());
        assert_eq!(format_local(local), "2024-01-16T02:00:00");
        assert_eq!(
            local_calendar_date(local),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
        );
    }

    #[test]
    fn test_to_local_negative_offset_goes_back_a_day() {
        let instant = parse_instant("2024-03-01T03:00:00Z").unwrap();
        let local = to_local(instant, LocalOffset::from_minutes(-300).unwrap());
        // 2024 is a leap year
        assert_eq!(format_local(local), "2024-02-29T22:00:00");
    }

    #[test]
    fn test_parse_instant_normalizes_offset_to_utc() {
        let instant = parse_instant("2024-01-16T02:00:00+08:00").unwrap();
        assert_eq!(format_instant(instant), "2024-01-15T18:00:00.000Z");
    }

    #[test]
    fn test_parse_instant_zoneless_is_utc() {
        let instant = parse_instant("2024-01-15T18:00:00.250").unwrap();
        assert_eq!(format_instant(instant), "2024-01-15T18:00:00.250Z");
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        let err = parse_instant("yesterday-ish").unwrap_err();
        assert!(err.to_string().contains("Invalid datetime"), "got: {err}");
    }

    #[test]
    fn test_parse_instant_rejects_years_outside_four_digits() {
        for s in [
            "+262142-12-31T23:00:00",
            "-262143-01-01T00:00:00",
            "+10000-01-01T00:00:00",
            "9999-12-31T23:00:00-05:00",
        ] {
            let err = parse_instant(s).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidDatetime(_)), "{s}: {err}");
        }
        assert!(parse_instant("9999-12-31T23:59:59.999Z").is_ok());
        assert!(parse_instant("0001-01-01T00:00:00Z").is_ok());
    }

    #[test]
    fn test_to_local_saturates_instead_of_overflowing() {
        let max = DateTime::<Utc>::MAX_UTC;
        assert_eq!(to_local(max, plus8()), NaiveDateTime::MAX);
        let min = DateTime::<Utc>::MIN_UTC;
        let minus8 = LocalOffset::from_minutes(-480).unwrap();
        assert_eq!(to_local(min, minus8), NaiveDateTime::MIN);
    }

    #[test]
    fn test_parse_instant_drops_sub_millisecond_digits() {
        let instant = parse_instant("2026-01-13T02:00:00.123456Z").unwrap();
        assert_eq!(format_instant(instant), "2026-01-13T02:00:00.123Z");
        assert_eq!(parse_instant(&format_instant(instant)).unwrap(), instant);
        assert_eq!(instant, parse_instant("2026-01-13T02:00:00.123999999").unwrap());
    }

    #[test]
    fn test_format_instant_round_trips() {
        let s = "2024-01-14T16:00:00.000Z";
        assert_eq!(format_instant(parse_instant(s).unwrap()), s);
    }

    #[test]
    fn test_offset_parse_forms() {
        assert_eq!("+08:00".parse::<LocalOffset>().unwrap().minutes(), 480);
        assert_eq!("+480".parse::<LocalOffset>().unwrap().minutes(), 480);
        assert_eq!("-0530".parse::<LocalOffset>().unwrap().minutes(), -330);
        assert_eq!("+08".parse::<LocalOffset>().unwrap().minutes(), 480);
        assert_eq!("Z".parse::<LocalOffset>().unwrap(), LocalOffset::UTC);
        assert_eq!("-120".parse::<LocalOffset>().unwrap().minutes(), -120);
    }

    #[test]
    fn test_offset_rejects_out_of_range() {
        assert!(LocalOffset::from_minutes(24 * 60).is_err());
        assert!("+25:00".parse::<LocalOffset>().is_err());
        assert!("+08:75".parse::<LocalOffset>().is_err());
        assert!("east".parse::<LocalOffset>().is_err());
    }

    #[test]
    fn test_offset_rejects_overflowing_input() {
        assert!(LocalOffset::from_minutes(i32::MIN).is_err());
        assert!(LocalOffset::from_minutes(i32::MAX).is_err());
        assert!("+99999999:00".parse::<LocalOffset>().is_err());
        assert!("-99999999999999999999".parse::<LocalOffset>().is_err());
        assert!("+2147483647".parse::<LocalOffset>().is_err());
        assert!(serde_json::from_str::<LocalOffset>("-2147483648").is_err());
    }

    #[test]
    fn test_offset_display() {
        assert_eq!(plus8().to_string(), "+08:00");
        assert_eq!(LocalOffset::from_minutes(-330).unwrap().to_string(), "-05:30");
        assert_eq!(LocalOffset::UTC.to_string(), "+00:00");
    }

    #[test]
    fn test_offset_deserializes_from_number_or_string() {
        let a: LocalOffset = serde_json::from_str("480").unwrap();
        let b: LocalOffset = serde_json::from_str("\"+08:00\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<LocalOffset>("2000").is_err());
    }
}
