//! Webprobe Core Library
//!
//! Domain model, collaborator traits, the test-file format, the
//! concurrency-limited scheduler and run reporting shared by the webprobe
//! crates.

pub mod config;
pub mod domain;
pub mod fakes;
pub mod reporting;
pub mod scheduler;
pub mod service;
pub mod spec_file;
pub mod summary;
pub mod telemetry;

pub use config::RunnerConfig;

pub use domain::{
    ConfigError, ExecutionResult, FormatError, ServiceError, ServiceResult, SpecDefaults,
    SpecOrigin, SuiteEntry, TestSpecification, TestStatus,
};

pub use reporting::{
    artifact_timestamp, render_console_summary, render_summary_md, suite_digest,
    write_results_json, write_summary_md, ResultsRecord,
};

pub use scheduler::{run_bounded, Settled};

pub use service::{
    CompletionModel, OutputFile, SessionId, TaskId, TaskRequest, TaskService, TaskStatus,
    TaskUpdate,
};

pub use spec_file::{
    discover_test_files, load_test_file, load_test_suite, parse_test_file, serialize_test_spec,
};

pub use summary::{decide_exit, ExitDecision, RunSummary};

pub use telemetry::init_tracing;
