//! Detect overlapping intervals, including intervals that are still open.
//!
//! Performs pairwise comparison between candidate and persisted entries.
//! Adjacent intervals (where one ends exactly when another starts) are NOT
//! overlaps: back-to-back activity is legal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::time_basis::{self, format_instant, truncate_to_millis, Instant};

// ── Interval ────────────────────────────────────────────────────────────────

/// A start instant plus an optional end. No end means the activity is ongoing.
///
/// Construction guarantees `end >= start` when an end is present, and drops
/// digits below the millisecond so the canonical form is lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: Instant,
    end: Option<Instant>,
}

impl Interval {
    /// # Errors
    ///
    /// Returns [`LedgerError::OutOfRange`] if `end` is before `start`.
    pub fn new(start: Instant, end: Option<Instant>) -> Result<Self, LedgerError> {
        let start = truncate_to_millis(start);
        let end = end.map(truncate_to_millis);
        if let Some(end) = end {
            if end < start {
                return Err(LedgerError::OutOfRange(format!(
                    "end {} is before start {}",
                    format_instant(end),
                    format_instant(start)
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn bounded(start: Instant, end: Instant) -> Result<Self, LedgerError> {
        Self::new(start, Some(end))
    }

    pub fn open(start: Instant) -> Self {
        Self {
            start: truncate_to_millis(start),
            end: None,
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Option<Instant> {
        self.end
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}–{}", format_instant(self.start), format_instant(end)),
            None => write!(f, "{}–ongoing", format_instant(self.start)),
        }
    }
}

// ── Entry ───────────────────────────────────────────────────────────────────

/// An [`Interval`] with the metadata carried alongside it.
///
/// The identity and label are opaque here; only the interval takes part in
/// overlap decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryRepr", into = "EntryRepr")]
pub struct Entry {
    pub id: Option<String>,
    pub label: Option<String>,
    pub interval: Interval,
}

impl Entry {
    pub fn new(interval: Interval) -> Self {
        Self {
            id: None,
            label: None,
            interval,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The label for display, or `(unlabeled)`.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("(unlabeled)")
    }
}

/// Flat wire form of an [`Entry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(with = "time_basis::canonical")]
    start: Instant,
    #[serde(default, with = "time_basis::canonical::option")]
    end: Option<Instant>,
}

impl TryFrom<EntryRepr> for Entry {
    type Error = LedgerError;

    fn try_from(repr: EntryRepr) -> Result<Self, Self::Error> {
        Ok(Entry {
            id: repr.id,
            label: repr.label,
            interval: Interval::new(repr.start, repr.end)?,
        })
    }
}

impl From<Entry> for EntryRepr {
    fn from(entry: Entry) -> Self {
        EntryRepr {
            id: entry.id,
            label: entry.label,
            start: entry.interval.start,
            end: entry.interval.end,
        }
    }
}

// ── Overlap rules ───────────────────────────────────────────────────────────

/// How a detected overlap came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapKind {
    /// Both intervals are bounded and share wall-clock time.
    TimeOverlap,
    /// At least one side is still open.
    OngoingConflict,
}

impl fmt::Display for OverlapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverlapKind::TimeOverlap => "time_overlap",
            OverlapKind::OngoingConflict => "ongoing_conflict",
        })
    }
}

/// Whether two intervals share a wall-clock moment.
///
/// - Both bounded: `a.start < b.end && b.start < a.end`; touching endpoints do
///   not overlap.
/// - One open: the open interval extends forward indefinitely, so the bounded
///   one overlaps iff it starts at or after the open one's start.
/// - Both open: always an overlap.
///
/// An interval identical to another always overlaps it, zero-length ones included.
pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    if a == b {
        return true;
    }
    match (a.end, b.end) {
        (Some(a_end), Some(b_end)) => a.start < b_end && b.start < a_end,
        (None, Some(_)) => b.start >= a.start,
        (Some(_), None) => a.start >= b.start,
        (None, None) => true,
    }
}

/// Classify an overlapping pair. Only meaningful when [`overlaps`] is true.
pub fn classify(a: &Interval, b: &Interval) -> OverlapKind {
    if a.is_open() || b.is_open() {
        OverlapKind::OngoingConflict
    } else {
        OverlapKind::TimeOverlap
    }
}

/// Length of the shared span in whole minutes, for two bounded intervals.
///
/// Returns `None` if either side is open or the intervals do not overlap.
pub fn overlap_minutes(a: &Interval, b: &Interval) -> Option<i64> {
    let (a_end, b_end) = (a.end?, b.end?);
    if !overlaps(a, b) {
        return None;
    }
    let shared_start = a.start.max(b.start);
    let shared_end = a_end.min(b_end);
    Some((shared_end - shared_start).num_minutes())
}

/// A candidate entry paired with the persisted entry it conflicts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapRecord {
    pub candidate: Entry,
    pub existing: Entry,
    pub kind: OverlapKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_minutes: Option<i64>,
}

/// Find every (candidate, persisted) pair that overlaps.
///
/// Records come out candidate-major, then in persisted order.
pub fn find_overlaps(candidates: &[Entry], persisted: &[Entry]) -> Vec<OverlapRecord> {
    let mut records = Vec::new();

    for candidate in candidates {
        for existing in persisted {
            let (a, b) = (&candidate.interval, &existing.interval);
            if overlaps(a, b) {
                records.push(OverlapRecord {
                    candidate: candidate.clone(),
                    existing: existing.clone(),
                    kind: classify(a, b),
                    overlap_minutes: overlap_minutes(a, b),
                });
            }
        }
    }

    records
}

// ── Tests ───────────────────────────────────────────────────────────────────
