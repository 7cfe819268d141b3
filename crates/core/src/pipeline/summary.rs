//! Run summary returned to the caller.

use serde::Serialize;

use tidemark_fetch::ThrottleStats;

use super::run_context::CounterSnapshot;

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// No failures.
    Success,
    /// Mixed successes and failures.
    Partial,
    /// Failures and not a single success.
    Failure,
}

/// What a run did, returned by the orchestrator and printed by the CLI.
/// Individual errors are attached to their ledger rows, not carried here.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub elapsed_secs: f64,
    pub files_passed: u64,
    pub files_failed: u64,
    pub files_skipped: u64,
    pub rows_promoted: u64,
    pub entries_failed: u64,
    pub throttle_max_depth: usize,
    pub throttle_wait_count: u64,
    pub throttle_wait_ms: u64,
    pub status: RunStatus,
}

impl RunSummary {
    pub fn build(
        run_id: String,
        elapsed_secs: f64,
        counters: CounterSnapshot,
        throttle: ThrottleStats,
    ) -> Self {
        Self {
            run_id,
            elapsed_secs,
            files_passed: counters.files_passed,
            files_failed: counters.files_failed,
            files_skipped: counters.files_skipped,
            rows_promoted: counters.rows_promoted,
            entries_failed: counters.entries_failed,
            throttle_max_depth: throttle.max_depth,
            throttle_wait_count: throttle.wait_count,
            throttle_wait_ms: throttle.total_wait_ms,
            status: Self::resolve_status(&counters),
        }
    }

    /// `success` with no failures, `failure` with no successes and at
    /// least one failure, `partial` otherwise. A run with nothing to do is
    /// a success.
    fn resolve_status(counters: &CounterSnapshot) -> RunStatus {
        let failures = counters.files_failed + counters.entries_failed;
        let successes = counters.files_passed;
        match (successes, failures) {
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::Failure,
            _ => RunStatus::Partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(passed: u64, failed: u64) -> CounterSnapshot {
        CounterSnapshot {
            files_passed: passed,
            files_failed: failed,
            ..Default::default()
        }
    }

    fn summary(passed: u64, failed: u64) -> RunSummary {
        RunSummary::build(
            "run-1".to_string(),
            1.5,
            counters(passed, failed),
            ThrottleStats::default(),
        )
    }

    #[test]
    fn test_status_resolution() {
        assert_eq!(summary(3, 0).status, RunStatus::Success);
        assert_eq!(summary(0, 0).status, RunStatus::Success);
        assert_eq!(summary(2, 1).status, RunStatus::Partial);
        assert_eq!(summary(0, 2).status, RunStatus::Failure);
    }

    #[test]
    fn test_promotion_failures_count_against_status() {
        let mut c = counters(1, 0);
        c.entries_failed = 1;
        let summary = RunSummary::build(
            "run-1".to_string(),
            0.1,
            c,
            ThrottleStats::default(),
        );
        assert_eq!(summary.status, RunStatus::Partial);
    }
}
