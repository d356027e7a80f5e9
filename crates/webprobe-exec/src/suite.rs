//! Runs an ordered suite through the scheduler and the executor.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use webprobe_core::{run_bounded, ExecutionResult, Settled, SuiteEntry, TestStatus};

use crate::executor::SessionExecutor;

pub const PARSE_FAILURE: &str = "failed to parse test case";
pub const INTERRUPTED: &str = "run interrupted";

/// Execute every entry with at most `limit` tests in flight.
///
/// `results[i]` always describes `entries[i]`. Entries that could not be
/// parsed settle as `error` without touching the remote service. Flipping
/// `cancel` leaves unfinished entries as `pending`.
pub async fn run_suite(
    entries: Vec<SuiteEntry>,
    executor: Arc<SessionExecutor>,
    limit: usize,
    cancel: watch::Receiver<bool>,
) -> Vec<ExecutionResult> {
    info!(tests = entries.len(), limit, "running suite");

    let settled = run_bounded(entries.clone(), limit, cancel, move |slot, entry| {
        let executor = Arc::clone(&executor);
        async move {
            let result = match &entry {
                SuiteEntry::Ready(spec) => executor.execute(slot, spec).await,
                SuiteEntry::Invalid { .. } => {
                    ExecutionResult::unsettled(&entry, TestStatus::Error, PARSE_FAILURE)
                }
            };
            Ok::<_, std::convert::Infallible>(result)
        }
    })
    .await;

    entries
        .iter()
        .zip(settled)
        .map(|(entry, outcome)| match outcome {
            Settled::Completed(result) => result,
            Settled::Failed(reason) => ExecutionResult::unsettled(entry, TestStatus::Error, reason),
            Settled::Cancelled => ExecutionResult::unsettled(entry, TestStatus::Pending, INTERRUPTED),
        })
        .collect()
}
