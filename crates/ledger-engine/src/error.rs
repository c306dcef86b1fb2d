//! Error types for ledger-engine operations.
//!
//! [`LedgerError`] and [`crate::admission::ValidationError`] describe a single
//! malformed value or record. [`OverlapBlockedError`] rejects a whole batch.
//! Store failures never pass through these types; see [`GuardError`].

use thiserror::Error;

use crate::overlap::OverlapRecord;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// A batch was refused because at least one candidate overlaps a persisted entry.
///
/// The `Display` output is the full human-readable summary and may be shown
/// to a user verbatim.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct OverlapBlockedError {
    pub records: Vec<OverlapRecord>,
    pub message: String,
}

impl OverlapBlockedError {
    /// Number of conflicting (candidate, persisted) pairs.
    pub fn conflict_count(&self) -> usize {
        self.records.len()
    }
}

/// Failure of [`crate::guard::admit`].
///
/// `Store` carries the store's own error value untouched so callers can tell
/// an infrastructure failure apart from a rule rejection.
#[derive(Error, Debug)]
pub enum GuardError<E> {
    #[error(transparent)]
    Blocked(OverlapBlockedError),

    #[error("store error: {0}")]
    Store(#[source] E),
}

impl<E> GuardError<E> {
    pub fn is_blocked(&self) -> bool {
        matches!(self, GuardError::Blocked(_))
    }
}
