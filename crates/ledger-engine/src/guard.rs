//! Block a batch that would record time already present in the store.
//!
//! The guard reads persisted entries whose start lies in the import range and
//! checks every candidate against every one of them. It never inserts and
//! never admits part of a batch.
//!
//! Admission is not atomic with the later write. Callers sharing a store must
//! hold a range-scoped lock (or a repeatable-read transaction) across
//! [`admit`] and the insert; [`admit_and_write`] does this for a single
//! process by holding `&mut` on the store throughout.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::boundary::calendar_date_of;
use crate::error::{GuardError, OverlapBlockedError};
use crate::overlap::{find_overlaps, Entry, Interval, OverlapRecord};
use crate::store::{IntervalSink, IntervalStore};
use crate::time_basis::{format_instant, to_local, Instant, LocalOffset};

/// Outcome of [`detect_overlaps`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlapReport {
    pub has_overlap: bool,
    pub overlaps: Vec<OverlapRecord>,
}

/// Whether the store holds any entry starting in `[start, end]`.
///
/// # Errors
///
/// Store errors are returned as-is.
pub fn exists_in_range<S: IntervalStore>(
    store: &S,
    start: Instant,
    end: Instant,
) -> Result<bool, S::Error> {
    store.any_in_range(start, end)
}

/// Compare every candidate against every persisted entry starting in `[start, end]`.
///
/// # Errors
///
/// Store errors are returned as-is.
pub fn detect_overlaps<S: IntervalStore>(
    store: &S,
    start: Instant,
    end: Instant,
    candidates: &[Entry],
) -> Result<OverlapReport, S::Error> {
    let persisted = store.query_range(start, end)?;
    let overlaps = find_overlaps(candidates, &persisted);

    debug!(
        candidates = candidates.len(),
        persisted = persisted.len(),
        conflicts = overlaps.len(),
        "overlap scan finished"
    );

    Ok(OverlapReport {
        has_overlap: !overlaps.is_empty(),
        overlaps,
    })
}

/// Decide whether `candidates` may be written for the range `[start, end]`.
///
/// Runs [`exists_in_range`] first; an empty range admits immediately.
/// Otherwise runs [`detect_overlaps`] and refuses the whole batch on any hit.
/// `offset` is used only to render local times in the refusal message.
///
/// # Errors
///
/// - [`GuardError::Blocked`] when any candidate overlaps a persisted entry.
/// - [`GuardError::Store`] with the store's own error if a read fails.
pub fn admit<S: IntervalStore>(
    store: &S,
    start: Instant,
    end: Instant,
    candidates: &[Entry],
    offset: LocalOffset,
) -> Result<(), GuardError<S::Error>> {
    if candidates.is_empty() {
        debug!("no candidates, nothing to check");
        return Ok(());
    }

    if !exists_in_range(store, start, end).map_err(GuardError::Store)? {
        debug!(
            range_start = %format_instant(start),
            range_end = %format_instant(end),
            "range is empty in store, admitting"
        );
        return Ok(());
    }

    let report = detect_overlaps(store, start, end, candidates).map_err(GuardError::Store)?;
    if report.has_overlap {
        warn!(
            conflicts = report.overlaps.len(),
            "batch blocked by overlapping entries"
        );
        let message = render_summary(&report.overlaps, offset);
        return Err(GuardError::Blocked(OverlapBlockedError {
            records: report.overlaps,
            message,
        }));
    }

    info!(candidates = candidates.len(), "batch admitted");
    Ok(())
}

/// [`admit`], then insert the batch, under one exclusive borrow of the store.
///
/// Returns the number of entries written.
///
/// # Errors
///
/// As [`admit`]; a failed insert is reported as [`GuardError::Store`].
pub fn admit_and_write<S>(
    store: &mut S,
    start: Instant,
    end: Instant,
    candidates: Vec<Entry>,
    offset: LocalOffset,
) -> Result<usize, GuardError<<S as IntervalStore>::Error>>
where
    S: IntervalStore + IntervalSink<Error = <S as IntervalStore>::Error>,
{
    admit(&*store, start, end, &candidates, offset)?;
    let written = candidates.len();
    if written > 0 {
        store.insert_batch(candidates).map_err(GuardError::Store)?;
    }
    Ok(written)
}

// ── Message rendering ───────────────────────────────────────────────────────

/// Human-readable summary of a refused batch.
///
/// One header line with the conflict count, one numbered line per conflict,
/// then what to do about it.
pub fn render_summary(records: &[OverlapRecord], offset: LocalOffset) -> String {
    let count = records.len();
    let mut lines = Vec::with_capacity(count + 2);
    lines.push(format!(
        "{count} overlapping {} found:",
        if count == 1 { "entry" } else { "entries" }
    ));

    for (i, record) in records.iter().enumerate() {
        lines.push(format!(
            "{}. new entry \"{}\" ({}) conflicts with existing \"{}\" ({})",
            i + 1,
            record.candidate.display_label(),
            local_window(&record.candidate.interval, offset),
            record.existing.display_label(),
            local_window(&record.existing.interval, offset),
        ));
    }

    lines.push(
        "Nothing was imported. Remove or shorten the conflicting entries in the store or \
         the export, or narrow the import range, then run the import again."
            .to_string(),
    );
    lines.join("\n")
}

/// `2026-01-14 09:00–12:00`, `2026-01-14 23:00–2026-01-15 01:00`, or `2026-01-14 09:00–ongoing`.
fn local_window(interval: &Interval, offset: LocalOffset) -> String {
    let start = to_local(interval.start(), offset);
    let head = start.format("%Y-%m-%d %H:%M");
    match interval.end() {
        None => format!("{head}–ongoing"),
        Some(end) => {
            let same_day =
                calendar_date_of(end, offset) == calendar_date_of(interval.start(), offset);
            let end_local = to_local(end, offset);
            if same_day {
                format!("{head}–{}", end_local.format("%H:%M"))
            } else {
                format!("{head}–{}", end_local.format("%Y-%m-%d %H:%M"))
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
