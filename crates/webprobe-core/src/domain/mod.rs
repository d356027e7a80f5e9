//! Domain models for webprobe.
//!
//! Canonical definitions for the core entities:
//! - `TestSpecification`: one unit of test intent (instructions + metadata)
//! - `ExecutionResult`: the settled outcome of running one specification
//! - `SuiteEntry`: a slot in the ordered run list

pub mod error;
pub mod result;
pub mod spec;

pub use error::{ConfigError, FormatError, ServiceError, ServiceResult};
pub use result::{ExecutionResult, TestStatus};
pub use spec::{SpecDefaults, SpecOrigin, SuiteEntry, TestSpecification};
