//! Test specifications and the ordered run list.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where a specification came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum SpecOrigin {
    /// Authored by hand in the test directory.
    File(PathBuf),

    /// Produced by diff-based generation (path of the emitted file, if written).
    Generated(Option<PathBuf>),
}

impl fmt::Display for SpecOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecOrigin::File(path) => write!(f, "{}", path.display()),
            SpecOrigin::Generated(Some(path)) => write!(f, "{} (generated)", path.display()),
            SpecOrigin::Generated(None) => write!(f, "generated"),
        }
    }
}

/// Values applied when a test file leaves a field unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDefaults {
    pub timeout_secs: u64,
    pub llm_model: String,
}

impl Default for SpecDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            llm_model: "browser-use-llm".to_string(),
        }
    }
}

/// One unit of test intent.
///
/// Built once (from a file or from generation) and never mutated afterwards;
/// its identity within a run is its position in the run list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpecification {
    /// Human-readable test name.
    pub name: String,

    /// Optional longer description.
    pub description: String,

    /// Natural-language instructions handed to the remote agent.
    pub instructions: String,

    /// Wall-clock budget in seconds.
    pub timeout_secs: u64,

    /// Model identifier passed to the remote service.
    pub llm_model: String,

    /// Remote identifiers of input artifacts.
    pub input_files: Vec<String>,

    /// What a successful run is expected to show.
    pub expected_output: Option<String>,

    /// Where this specification came from.
    pub origin: SpecOrigin,
}

impl TestSpecification {
    /// Create a specification with defaults for every optional field.
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        defaults: &SpecDefaults,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            timeout_secs: defaults.timeout_secs,
            llm_model: defaults.llm_model.clone(),
            input_files: Vec::new(),
            expected_output: None,
            origin: SpecOrigin::Generated(None),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_origin(mut self, origin: SpecOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A slot in the ordered run list.
///
/// A test file that fails to parse still occupies its position so that the
/// result list stays aligned with the discovered files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuiteEntry {
    Ready(TestSpecification),
    Invalid { path: PathBuf, reason: String },
}

impl SuiteEntry {
    /// Display name; an invalid entry falls back to its file stem.
    pub fn name(&self) -> &str {
        match self {
            SuiteEntry::Ready(spec) => &spec.name,
            SuiteEntry::Invalid { path, .. } => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("invalid"),
        }
    }
}
