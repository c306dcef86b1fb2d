//! Store boundary used by the duplicate guard.
//!
//! The guard only ever reads. Writing is the caller's business, done through
//! [`IntervalSink`] after admission succeeds. Both traits take the store as an
//! explicit handle so a test can hand in a [`MemoryStore`].

use std::convert::Infallible;

use crate::overlap::Entry;
use crate::time_basis::Instant;

/// Read access to persisted entries.
pub trait IntervalStore {
    /// Error type for store operations. Passed through the guard unchanged.
    type Error;

    /// Every persisted entry whose start lies in `[start, end]`, both inclusive.
    fn query_range(&self, start: Instant, end: Instant) -> Result<Vec<Entry>, Self::Error>;

    /// Whether any persisted entry starts in `[start, end]`.
    ///
    /// Stores with a cheaper existence check (`SELECT 1 ... LIMIT 1`) should
    /// override this.
    fn any_in_range(&self, start: Instant, end: Instant) -> Result<bool, Self::Error> {
        Ok(!self.query_range(start, end)?.is_empty())
    }
}

/// Write access, used after a batch has been admitted.
pub trait IntervalSink {
    type Error;

    fn insert_batch(&mut self, entries: Vec<Entry>) -> Result<(), Self::Error>;
}

impl<S: IntervalStore + ?Sized> IntervalStore for &S {
    type Error = S::Error;

    fn query_range(&self, start: Instant, end: Instant) -> Result<Vec<Entry>, Self::Error> {
        (**self).query_range(start, end)
    }

    fn any_in_range(&self, start: Instant, end: Instant) -> Result<bool, Self::Error> {
        (**self).any_in_range(start, end)
    }
}

/// A `Vec`-backed store, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: Vec<Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntervalStore for MemoryStore {
    type Error = Infallible;

    fn query_range(&self, start: Instant, end: Instant) -> Result<Vec<Entry>, Self::Error> {
        Ok(self
            .entries
            .iter()
            .filter(|e| (start..=end).contains(&e.interval.start()))
            .cloned()
            .collect())
    }

    fn any_in_range(&self, start: Instant, end: Instant) -> Result<bool, Self::Error> {
        Ok(self
            .entries
            .iter()
            .any(|e| (start..=end).contains(&e.interval.start())))
    }
}

impl IntervalSink for MemoryStore {
    type Error = Infallible;

    fn insert_batch(&mut self, entries: Vec<Entry>) -> Result<(), Self::Error> {
        self.entries.extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::Interval;
    use crate::time_basis::parse_instant;

    fn entry(start: &str) -> Entry {
        Entry::new(Interval::open(parse_instant(start).unwrap()))
    }

    #[test]
    fn test_query_range_is_inclusive_on_start() {
        let store = MemoryStore::from_entries(vec![
            entry("2026-01-13T23:59:59.999Z"),
            entry("2026-01-14T00:00:00Z"),
            entry("2026-01-14T23:59:59.999Z"),
            entry("2026-01-15T00:00:00Z"),
        ]);
        let start = parse_instant("2026-01-14T00:00:00Z").unwrap();
        let end = parse_instant("2026-01-14T23:59:59.999Z").unwrap();
        assert_eq!(store.query_range(start, end).unwrap().len(), 2);
        assert!(store.any_in_range(start, end).unwrap());
    }

    #[test]
    fn test_empty_store_has_nothing_in_range() {
        let store = MemoryStore::new();
        let t = parse_instant("2026-01-14T00:00:00Z").unwrap();
        assert!(!store.any_in_range(t, t).unwrap());
        assert!(store.query_range(t, t).unwrap().is_empty());
    }

    #[test]
    fn test_insert_batch_appends_in_order() {
        let mut store = MemoryStore::new();
        store
            .insert_batch(vec![entry("2026-01-14T01:00:00Z"), entry("2026-01-14T00:00:00Z")])
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.entries()[0].interval.start(),
            parse_instant("2026-01-14T01:00:00Z").unwrap()
        );
    }
}
