//! Per-test execution results.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::spec::{SuiteEntry, TestSpecification};

/// Final status of one test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// Not yet settled (only survives into a report when the run was interrupted).
    Pending,
    Passed,
    Failed,
    Error,
    Timeout,
    /// The remote agent reported it could not complete the task.
    NotFinished,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Error => "error",
            TestStatus::Timeout => "timeout",
            TestStatus::NotFinished => "not-finished",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TestStatus::Pending => "⏳",
            TestStatus::Passed => "✅",
            TestStatus::Failed => "❌",
            TestStatus::Error => "⚠️",
            TestStatus::Timeout => "⏱️",
            TestStatus::NotFinished => "🚧",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The settled outcome of one test specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Test name.
    pub name: String,

    /// Where the specification came from.
    pub source: String,

    /// Final status.
    pub status: TestStatus,

    /// Final output text of the remote agent.
    pub output: Option<String>,

    /// Human-readable error, if any.
    pub error: Option<String>,

    /// Wall-clock duration in seconds.
    #[serde(rename = "duration")]
    pub duration_secs: f64,

    /// Remote task identifier, once submitted.
    pub task_id: Option<String>,

    /// Remote session identifier, once opened.
    pub session_id: Option<String>,

    /// Identifiers of every artifact the task produced, saved or not.
    #[serde(default)]
    pub output_file_ids: Vec<String>,

    /// Local paths of downloaded output artifacts.
    pub output_files: Vec<PathBuf>,
}

impl ExecutionResult {
    /// A fresh, unsettled result for `spec`.
    pub fn pending(spec: &TestSpecification) -> Self {
        Self {
            name: spec.name.clone(),
            source: spec.origin.to_string(),
            status: TestStatus::Pending,
            output: None,
            error: None,
            duration_secs: 0.0,
            task_id: None,
            session_id: None,
            output_file_ids: Vec::new(),
            output_files: Vec::new(),
        }
    }

    /// A result for a suite slot that never reached the remote service.
    pub fn unsettled(entry: &SuiteEntry, status: TestStatus, error: impl Into<String>) -> Self {
        let (name, source) = match entry {
            SuiteEntry::Ready(spec) => (spec.name.clone(), spec.origin.to_string()),
            SuiteEntry::Invalid { path, .. } => {
                (entry.name().to_string(), path.display().to_string())
            }
        };
        Self {
            name,
            source,
            status,
            output: None,
            error: Some(error.into()),
            duration_secs: 0.0,
            task_id: None,
            session_id: None,
            output_file_ids: Vec::new(),
            output_files: Vec::new(),
        }
    }
}
