//! Run-scoped context and counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{NaiveDate, Utc};

/// Thread-safe aggregate counters of one run.
///
/// Owned by the orchestrator, incremented by fetch workers and the
/// promotion engine. Plain relaxed atomics: the counters are statistics,
/// not synchronization.
#[derive(Debug, Default)]
pub struct RunCounters {
    files_passed: AtomicU64,
    files_failed: AtomicU64,
    files_skipped: AtomicU64,
    rows_promoted: AtomicU64,
    entries_failed: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub files_passed: u64,
    pub files_failed: u64,
    pub files_skipped: u64,
    pub rows_promoted: u64,
    pub entries_failed: u64,
}

impl RunCounters {
    pub fn file_passed(&self) {
        self.files_passed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rows_promoted(&self, rows: u64) {
        self.rows_promoted.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn entry_failed(&self) {
        self.entries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            files_passed: self.files_passed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            rows_promoted: self.rows_promoted.load(Ordering::Relaxed),
            entries_failed: self.entries_failed.load(Ordering::Relaxed),
        }
    }
}

/// Identity and clock of one pipeline run, shared by every stage.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: String,
    pub ingestion_date: NaiveDate,
    pub started: Instant,
    pub counters: RunCounters,
}

impl RunContext {
    pub fn new() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    /// Context pinned to a specific ingestion date, used by backfills and
    /// tests.
    pub fn for_date(ingestion_date: NaiveDate) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            ingestion_date,
            started: Instant::now(),
            counters: RunCounters::default(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = RunCounters::default();
        counters.file_passed();
        counters.file_passed();
        counters.file_failed();
        counters.file_skipped();
        counters.rows_promoted(42);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.files_passed, 2);
        assert_eq!(snapshot.files_failed, 1);
        assert_eq!(snapshot.files_skipped, 1);
        assert_eq!(snapshot.rows_promoted, 42);
        assert_eq!(snapshot.entries_failed, 0);
    }

    #[test]
    fn test_contexts_have_distinct_run_ids() {
        let a = RunContext::new();
        let b = RunContext::new();
        assert_ne!(a.run_id, b.run_id);
    }
}
