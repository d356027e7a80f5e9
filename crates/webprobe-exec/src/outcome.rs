//! Completion-marker protocol and final status resolution.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use webprobe_core::{TaskStatus, TestStatus};

use crate::error::ExecutionError;

pub const MARKER_COMPLETED: &str = "<status>completed</status>";
pub const MARKER_FAILED: &str = "<status>failed</status>";
pub const MARKER_NOT_FINISHED: &str = "<status>not-finished</status>";

/// Clause appended to every task so the agent reports its outcome in-band.
pub fn marker_clause() -> String {
    format!(
        "When you are done, end your final answer with exactly one status marker: \
         {MARKER_COMPLETED} if every step succeeded and the expected outcome was observed, \
         {MARKER_FAILED} if the application did not behave as described, \
         or {MARKER_NOT_FINISHED} if you could not complete the steps for any other reason."
    )
}

/// Marker found in the agent's final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Completed,
    Failed,
    NotFinished,
}

fn marker_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<status>\s*(completed|failed|not-finished)\s*</status>").ok()
    })
    .as_ref()
}

/// Scan `output` for completion markers.
///
/// When several appear, `failed` wins over `not-finished`, which wins over
/// `completed`.
pub fn scan_marker(output: &str) -> Option<Marker> {
    let re = marker_regex()?;
    let mut found = None;
    for caps in re.captures_iter(output) {
        let marker = match caps[1].to_ascii_lowercase().as_str() {
            "failed" => Marker::Failed,
            "not-finished" => Marker::NotFinished,
            _ => Marker::Completed,
        };
        found = Some(match (found, marker) {
            (_, Marker::Failed) | (Some(Marker::Failed), _) => Marker::Failed,
            (_, Marker::NotFinished) | (Some(Marker::NotFinished), _) => Marker::NotFinished,
            _ => Marker::Completed,
        });
        if found == Some(Marker::Failed) {
            break;
        }
    }
    found
}

/// Status and error message for a settled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: TestStatus,
    pub error: Option<String>,
    /// Set when a `finished` task carried no marker.
    pub missing_marker: bool,
}

impl Resolution {
    fn new(status: TestStatus, error: Option<&str>) -> Self {
        Self {
            status,
            error: error.map(str::to_string),
            missing_marker: false,
        }
    }
}

/// Map the terminal status of a task to a test status.
///
/// `terminal` is `None` when the feed ended without a terminal status.
pub fn resolve(
    terminal: Option<&TaskStatus>,
    output: Option<&str>,
    elapsed: Duration,
    timeout: Duration,
) -> Resolution {
    match terminal {
        Some(TaskStatus::Finished) => match scan_marker(output.unwrap_or_default()) {
            Some(Marker::Completed) => Resolution::new(TestStatus::Passed, None),
            Some(Marker::Failed) => {
                Resolution::new(TestStatus::Failed, Some("remote agent reported failure"))
            }
            Some(Marker::NotFinished) => Resolution::new(
                TestStatus::NotFinished,
                Some("remote agent could not complete the task"),
            ),
            None => Resolution {
                missing_marker: true,
                ..Resolution::new(TestStatus::Passed, None)
            },
        },
        Some(TaskStatus::Stopped) if elapsed >= timeout => Resolution::new(
            TestStatus::Timeout,
            Some(&format!("timed out after {}s", timeout.as_secs())),
        ),
        Some(TaskStatus::Stopped) => {
            Resolution::new(TestStatus::Failed, Some("stopped before completion"))
        }
        Some(other) => Resolution::new(
            TestStatus::Error,
            Some(&ExecutionError::UnexpectedTerminal(other.to_string()).to_string()),
        ),
        None => Resolution::new(
            TestStatus::Error,
            Some(
                &ExecutionError::UnexpectedTerminal(
                    "feed ended without a terminal status".to_string(),
                )
                .to_string(),
            ),
        ),
    }
}
