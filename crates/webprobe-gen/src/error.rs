//! Error types for diff-driven test generation.

use std::path::PathBuf;

use webprobe_core::FormatError;

/// Failures of the generation phase. Any of these aborts the run before a
/// single test is executed.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("invalid git reference '{reference}': {detail}")]
    InvalidReference { reference: String, detail: String },

    #[error("no changes between {base} and {head}")]
    EmptyDiff { base: String, head: String },

    #[error("test generation failed after {attempts} attempts: {last_error}")]
    GenerationFailed { attempts: u32, last_error: String },

    #[error("could not parse generated test cases: {0}")]
    UnparseableResponse(String),

    #[error("the model returned no usable test cases")]
    NoTestCasesGenerated,

    #[error("git error: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not write test file: {0}")]
    Format(#[from] FormatError),
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;
