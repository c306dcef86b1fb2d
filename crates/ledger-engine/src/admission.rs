//! Turn raw exported records into validated entries.
//!
//! Raw records come straight from the upstream export and may be missing
//! fields or carry the wrong types. [`filter_batch`] never aborts on a bad
//! record: it sets it aside with a reason and moves on.
//!
//! Records that start on the current local day are held back, since the
//! source may still be editing them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::boundary::{boundaries_for, calendar_date_of, range_for_dates, DayBoundary};
use crate::overlap::{Entry, Interval};
use crate::time_basis::{
    format_instant, format_local, parse_instant, to_local, Instant, LocalOffset,
};

// ── Options ─────────────────────────────────────────────────────────────────

/// Settings for [`validate_shape`] and [`filter_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionOptions {
    /// Offset used to decide which local day a record belongs to.
    pub offset: LocalOffset,
    /// Earliest local date a timestamp may fall on.
    pub earliest: NaiveDate,
    /// How far past `now` a timestamp may lie, in days. Absorbs clock skew
    /// between the source and this machine.
    pub max_future_days: i64,
}

impl Default for AdmissionOptions {
    fn default() -> Self {
        Self {
            offset: LocalOffset::UTC,
            earliest: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
            max_future_days: 1,
        }
    }
}

impl AdmissionOptions {
    pub fn with_offset(offset: LocalOffset) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }
}

// ── Raw input ───────────────────────────────────────────────────────────────

/// One record as exported by the upstream source, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub start: Option<Value>,
    #[serde(default)]
    pub end: Option<Value>,
}

impl RawEntry {
    pub fn new(start: impl Into<String>, end: Option<&str>) -> Self {
        Self {
            id: None,
            label: None,
            start: Some(Value::String(start.into())),
            end: end.map(|e| Value::String(e.to_string())),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

// ── Rejections ──────────────────────────────────────────────────────────────

/// Why a record was set aside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Starts on the current local day.
    FilteredToday,
    /// A timestamp is missing, of the wrong type, or unparsable.
    InvalidShape,
    /// A timestamp is outside the accepted historical window.
    OutOfRange,
    /// The end is before the start.
    BadOrder,
}

/// A single record failed admission. Never aborts a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("record {index}: {field}: {detail}")]
pub struct ValidationError {
    pub index: usize,
    pub field: &'static str,
    pub reason: RejectionReason,
    pub detail: String,
}

/// A raw record together with the reason it was not accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub raw: RawEntry,
    #[serde(flatten)]
    pub error: ValidationError,
}

impl Rejection {
    pub fn reason(&self) -> RejectionReason {
        self.error.reason
    }
}

/// Accepted entries and set-aside records, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOutcome {
    pub accepted: Vec<Entry>,
    pub rejected: Vec<Rejection>,
}

impl FilterOutcome {
    /// The UTC range covering every local date an accepted entry touches.
    ///
    /// This is the window to hand to the duplicate guard. `None` when nothing
    /// was accepted.
    pub fn import_range(&self, offset: LocalOffset) -> Option<DayBoundary> {
        let first = self
            .accepted
            .iter()
            .map(|e| calendar_date_of(e.interval.start(), offset))
            .min()?;
        let last = self
            .accepted
            .iter()
            .map(|e| {
                let end = e.interval.end().unwrap_or(e.interval.start());
                calendar_date_of(end, offset)
            })
            .max()?;
        range_for_dates(first, last, offset).ok()
    }
}

// ── Operations ──────────────────────────────────────────────────────────────

/// Whether `instant` falls on the same local date as `now`.
pub fn is_today_local(instant: Instant, offset: LocalOffset, now: Instant) -> bool {
    calendar_date_of(instant, offset) == calendar_date_of(now, offset)
}

/// Validate one raw record into an [`Entry`].
///
/// Requires a parsable `start`; `end` may be absent or `null` (an ongoing
/// activity) but otherwise must parse and not precede `start`. Both
/// timestamps must lie between the start of `options.earliest` and
/// `now + options.max_future_days`.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the field and `index`.
pub fn validate_shape(
    raw: &RawEntry,
    index: usize,
    options: &AdmissionOptions,
    now: Instant,
) -> Result<Entry, ValidationError> {
    let reject = |field: &'static str, reason: RejectionReason, detail: String| ValidationError {
        index,
        field,
        reason,
        detail,
    };

    let start = timestamp_field(raw.start.as_ref(), "start", index)?
        .ok_or_else(|| reject("start", RejectionReason::InvalidShape, "missing".to_string()))?;
    let end = timestamp_field(raw.end.as_ref(), "end", index)?;

    let earliest = boundaries_for(options.earliest, options.offset)
        .map(|b| b.start)
        .map_err(|e| reject("start", RejectionReason::OutOfRange, e.to_string()))?;
    let latest = Duration::try_days(options.max_future_days)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    for (field, value) in [("start", Some(start)), ("end", end)] {
        let Some(value) = value else { continue };
        if value < earliest || value > latest {
            return Err(reject(
                field,
                RejectionReason::OutOfRange,
                format!(
                    "{} is outside {}..={}",
                    format_instant(value),
                    format_instant(earliest),
                    format_instant(latest)
                ),
            ));
        }
    }

    let interval = Interval::new(start, end)
        .map_err(|e| reject("end", RejectionReason::BadOrder, e.to_string()))?;

    Ok(Entry {
        id: raw.id.as_ref().map(id_string),
        label: raw.label.clone(),
        interval,
    })
}

/// Validate every record and hold back today's, keeping input order.
pub fn filter_batch(raws: &[RawEntry], options: &AdmissionOptions, now: Instant) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for (index, raw) in raws.iter().enumerate() {
        match admit_one(raw, index, options, now) {
            Ok(entry) => outcome.accepted.push(entry),
            Err(error) => {
                debug!(index, reason = ?error.reason, field = error.field, "record set aside");
                outcome.rejected.push(Rejection {
                    raw: raw.clone(),
                    error,
                });
            }
        }
    }

    info!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "batch filtered"
    );
    outcome
}

fn admit_one(
    raw: &RawEntry,
    index: usize,
    options: &AdmissionOptions,
    now: Instant,
) -> Result<Entry, ValidationError> {
    if let Ok(Some(start)) = timestamp_field(raw.start.as_ref(), "start", index) {
        if is_today_local(start, options.offset, now) {
            return Err(ValidationError {
                index,
                field: "start",
                reason: RejectionReason::FilteredToday,
                detail: format!(
                    "starts at {} local, on the current local day",
                    format_local(to_local(start, options.offset))
                ),
            });
        }
    }
    validate_shape(raw, index, options, now)
}

/// Read an optional timestamp field. `null` and absent both mean `None`.
fn timestamp_field(
    value: Option<&Value>,
    field: &'static str,
    index: usize,
) -> Result<Option<Instant>, ValidationError> {
    let invalid = |detail: String| ValidationError {
        index,
        field,
        reason: RejectionReason::InvalidShape,
        detail,
    };

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_instant(s).map(Some).map_err(|e| invalid(e.to_string())),
        Some(other) => Err(invalid(format!("expected a timestamp string, got {other}"))),
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
