//! # ledger-engine
//!
//! Fixed-offset calendar boundaries and interval overlap detection for
//! importing time-tracking records.
//!
//! Source data arrives in UTC, but work belongs to a local calendar day. This
//! crate converts between the two without drift at day edges, and refuses a
//! batch of intervals that would record time already in the store.
//!
//! ## Modules
//!
//! - [`time_basis`] — UTC instant ↔ local timestamp under a fixed offset
//! - [`boundary`] — Local calendar day ↔ UTC instant range
//! - [`overlap`] — Interval overlap rules, open intervals included
//! - [`store`] — Store read/write traits and an in-memory store
//! - [`guard`] — Batch-level duplicate detection against the store
//! - [`admission`] — Raw record validation and today-exclusion
//! - [`error`] — Error types
//!
//! Data flows raw records → [`admission::filter_batch`] → [`guard::admit`] →
//! the caller's store write.

pub mod admission;
pub mod boundary;
pub mod error;
pub mod guard;
pub mod overlap;
pub mod store;
pub mod time_basis;

pub use admission::{
    filter_batch, is_today_local, validate_shape, AdmissionOptions, FilterOutcome, RawEntry,
    Rejection, RejectionReason, ValidationError,
};
pub use boundary::{
    boundaries_for, calendar_date_of, dates_in, instant_within, range_for_dates, within_boundary,
    DayBoundary,
};
pub use error::{GuardError, LedgerError, OverlapBlockedError};
pub use guard::{admit, admit_and_write, detect_overlaps, exists_in_range, OverlapReport};
pub use overlap::{classify, find_overlaps, overlaps, Entry, Interval, OverlapKind, OverlapRecord};
pub use store::{IntervalSink, IntervalStore, MemoryStore};
pub use time_basis::{
    format_instant, format_local, local_calendar_date, parse_instant, to_local,
    truncate_to_millis, CalendarDate, Instant, LocalOffset,
};
