//! Result aggregation and exit policy.

use serde::{Deserialize, Serialize};

use crate::domain::result::{ExecutionResult, TestStatus};

/// Counts of results per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub timeouts: usize,
    pub not_finished: usize,
    pub pending: usize,
    /// Passed share of the total, e.g. `"66.7%"`.
    pub success_rate: String,
}

impl RunSummary {
    /// Tally `results` by status.
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let mut summary = RunSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Error => summary.errors += 1,
                TestStatus::Timeout => summary.timeouts += 1,
                TestStatus::NotFinished => summary.not_finished += 1,
                TestStatus::Pending => summary.pending += 1,
            }
        }
        summary.success_rate = if summary.total > 0 {
            format!("{:.1}%", summary.passed as f64 / summary.total as f64 * 100.0)
        } else {
            "0%".to_string()
        };
        summary
    }
}

/// What the process should do once all results are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    /// Everything that counts passed.
    Success,
    /// Failures or timeouts were seen and the policy says to fail on them.
    TestsFailed,
    /// At least one test errored.
    Fatal,
}

impl ExitDecision {
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitDecision::Success => 0,
            ExitDecision::TestsFailed => 1,
            ExitDecision::Fatal => 2,
        }
    }
}

/// Apply the exit policy.
///
/// - any `error` → [`ExitDecision::Fatal`]
/// - any `failed` or `timeout` → [`ExitDecision::TestsFailed`] when
///   `fail_on_error`, otherwise success
/// - `not-finished` never counts as a failure
pub fn decide_exit(summary: &RunSummary, fail_on_error: bool) -> ExitDecision {
    if summary.errors > 0 {
        return ExitDecision::Fatal;
    }
    if summary.failed + summary.timeouts > 0 && fail_on_error {
        return ExitDecision::TestsFailed;
    }
    ExitDecision::Success
}
