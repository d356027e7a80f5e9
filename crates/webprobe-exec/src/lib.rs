//! Webprobe Execution
//!
//! Runs test specifications against the remote task service, one exclusive
//! session per test, with a bounded number of tests in flight.

pub mod artifacts;
pub mod cloud;
pub mod error;
pub mod executor;
pub mod outcome;
pub mod registry;
pub mod suite;

pub use artifacts::{artifact_dir_name, sanitize_component, save_output_files};
pub use cloud::BrowserUseClient;
pub use error::{ClientError, ExecResult, ExecutionError};
pub use executor::{ExecutorConfig, SessionExecutor};
pub use outcome::{marker_clause, resolve, scan_marker, Marker, Resolution};
pub use registry::SessionRegistry;
pub use suite::{run_suite, INTERRUPTED, PARSE_FAILURE};
