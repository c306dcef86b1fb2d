//! Local calendar days expressed as UTC instant ranges.
//!
//! A [`DayBoundary`] runs from local midnight to local 23:59:59.999, both
//! converted to UTC. Consecutive days tile the timeline exactly: the end of one
//! day plus one millisecond is the start of the next, so an inclusive check at
//! both ends never counts an instant twice.

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::LedgerError;
use crate::time_basis::{self, parse_instant, CalendarDate, Instant, LocalOffset};

/// UTC start and end (both inclusive) of one or more consecutive local days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DayBoundary {
    #[serde(with = "time_basis::canonical")]
    pub start: Instant,
    #[serde(with = "time_basis::canonical")]
    pub end: Instant,
}

impl DayBoundary {
    pub fn contains(&self, instant: Instant) -> bool {
        within_boundary(instant, self)
    }
}

fn end_of_day() -> NaiveTime {
    // 23:59:59.999 is always a valid time; the fallback is unreachable.
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

fn local_to_utc(local: NaiveDateTime, offset: LocalOffset) -> Result<Instant, LedgerError> {
    local
        .checked_sub_signed(offset.as_duration())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| LedgerError::OutOfRange(format!("{local} at offset {offset}")))
}

/// The UTC range covered by local calendar day `date` under `offset`.
///
/// # Errors
///
/// Returns [`LedgerError::OutOfRange`] only for dates at the very edge of the
/// representable range, where subtracting the offset would overflow.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ledger_engine::boundary::boundaries_for;
/// use ledger_engine::time_basis::{format_instant, LocalOffset};
///
/// let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let b = boundaries_for(day, LocalOffset::from_minutes(480).unwrap()).unwrap();
/// assert_eq!(format_instant(b.start), "2024-01-14T16:00:00.000Z");
/// assert_eq!(format_instant(b.end), "2024-01-15T15:59:59.999Z");
/// ```
pub fn boundaries_for(date: CalendarDate, offset: LocalOffset) -> Result<DayBoundary, LedgerError> {
    range_for_dates(date, date, offset)
}

/// The UTC range from the start of local day `first` to the end of local day `last`.
///
/// # Errors
///
/// Returns [`LedgerError::OutOfRange`] if `last` is before `first`, or if the
/// conversion overflows.
pub fn range_for_dates(
    first: CalendarDate,
    last: CalendarDate,
    offset: LocalOffset,
) -> Result<DayBoundary, LedgerError> {
    if last < first {
        return Err(LedgerError::OutOfRange(format!(
            "range ends ({last}) before it starts ({first})"
        )));
    }
    Ok(DayBoundary {
        start: local_to_utc(first.and_time(NaiveTime::MIN), offset)?,
        end: local_to_utc(last.and_time(end_of_day()), offset)?,
    })
}

/// The local calendar date `instant` falls on under `offset`.
pub fn calendar_date_of(instant: Instant, offset: LocalOffset) -> CalendarDate {
    time_basis::local_calendar_date(time_basis::to_local(instant, offset))
}

/// Whether `instant` lies inside `boundary`, inclusive at both ends.
pub fn within_boundary(instant: Instant, boundary: &DayBoundary) -> bool {
    boundary.start <= instant && instant <= boundary.end
}

/// [`within_boundary`] for a timestamp string.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidDatetime`] if `instant` cannot be parsed.
pub fn instant_within(instant: &str, boundary: &DayBoundary) -> Result<bool, LedgerError> {
    Ok(within_boundary(parse_instant(instant)?, boundary))
}

/// Every local calendar date touched by `boundary`, in ascending order.
pub fn dates_in(boundary: &DayBoundary, offset: LocalOffset) -> Vec<CalendarDate> {
    let first = calendar_date_of(boundary.start, offset);
    let last = calendar_date_of(boundary.end, offset);
    first
        .iter_days()
        .take_while(|d| *d <= last)
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_basis::format_instant;
    use chrono::{Duration, NaiveDate};

    /// One millisecond, the resolution at which consecutive days meet.
    fn tick() -> Duration {
        Duration::milliseconds(1)
    }

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn offset(minutes: i32) -> LocalOffset {
        LocalOffset::from_minutes(minutes).unwrap()
    }

    #[test]
    fn test_boundaries_for_utc_plus_8() {
        let b = boundaries_for(date(2024, 1, 15), offset(480)).unwrap();
        assert_eq!(format_instant(b.start), "2024-01-14T16:00:00.000Z");
        assert_eq!(format_instant(b.end), "2024-01-15T15:59:59.999Z");
    }

    #[test]
    fn test_boundaries_for_negative_offset() {
        let b = boundaries_for(date(2024, 1, 15), offset(-300)).unwrap();
        assert_eq!(format_instant(b.start), "2024-01-15T05:00:00.000Z");
        assert_eq!(format_instant(b.end), "2024-01-16T04:59:59.999Z");
    }

    #[test]
    fn test_days_tile_across_month_year_and_leap_day() {
        let o = offset(480);
        for (a, b) in [
            (date(2024, 2, 28), date(2024, 2, 29)),
            (date(2024, 2, 29), date(2024, 3, 1)),
            (date(2023, 2, 28), date(2023, 3, 1)),
            (date(2025, 12, 31), date(2026, 1, 1)),
        ] {
            let first = boundaries_for(a, o).unwrap();
            let second = boundaries_for(b, o).unwrap();
            assert_eq!(first.end + tick(), second.start, "{a} → {b}");
        }
    }

    #[test]
    fn test_calendar_date_of_round_trips_boundaries() {
        for minutes in [-720, -330, 0, 345, 480, 840] {
            let o = offset(minutes);
            let d = date(2024, 12, 31);
            let b = boundaries_for(d, o).unwrap();
            assert_eq!(calendar_date_of(b.start, o), d);
            assert_eq!(calendar_date_of(b.end, o), d);
            assert_eq!(calendar_date_of(b.end + tick(), o), date(2025, 1, 1));
            assert_eq!(calendar_date_of(b.start - tick(), o), date(2024, 12, 30));
        }
    }

    #[test]
    fn test_within_boundary_is_inclusive_at_both_ends() {
        let b = boundaries_for(date(2026, 1, 14), offset(480)).unwrap();
        assert!(within_boundary(b.start, &b));
        assert!(within_boundary(b.end, &b));
        assert!(!within_boundary(b.start - tick(), &b));
        assert!(!within_boundary(b.end + tick(), &b));
    }

    #[test]
    fn test_instant_within_parses_and_rejects() {
        let b = boundaries_for(date(2024, 1, 15), offset(480)).unwrap();
        assert!(instant_within("2024-01-15T02:00:00+08:00", &b).unwrap());
        assert!(!instant_within("2024-01-15T16:00:00Z", &b).unwrap());
        assert!(matches!(
            instant_within("15/01/2024", &b),
            Err(LedgerError::InvalidDatetime(_))
        ));
    }

    #[test]
    fn test_range_for_dates_spans_and_validates() {
        let o = offset(480);
        let r = range_for_dates(date(2026, 1, 12), date(2026, 1, 14), o).unwrap();
        assert_eq!(r.start, boundaries_for(date(2026, 1, 12), o).unwrap().start);
        assert_eq!(r.end, boundaries_for(date(2026, 1, 14), o).unwrap().end);
        assert_eq!(
            dates_in(&r, o),
            vec![date(2026, 1, 12), date(2026, 1, 13), date(2026, 1, 14)]
        );
        assert!(range_for_dates(date(2026, 1, 14), date(2026, 1, 12), o).is_err());
    }

    #[test]
    fn test_day_boundary_serializes_canonically() {
        let b = boundaries_for(date(2024, 1, 15), offset(480)).unwrap();
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(
            json,
            r#"{"start":"2024-01-14T16:00:00.000Z","end":"2024-01-15T15:59:59.999Z"}"#
        );
    }
}
