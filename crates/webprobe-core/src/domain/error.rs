//! Error taxonomy shared across webprobe crates.

use std::path::PathBuf;

/// Configuration problems detected before any work starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credential: {name} is not set")]
    MissingCredential { name: String },

    #[error("invalid setting {name}={value}: {reason}")]
    InvalidSetting {
        name: String,
        value: String,
        reason: String,
    },

    #[error("test directory does not exist: {}", .0.display())]
    TestDirectoryMissing(PathBuf),
}

/// Failures talking to a remote collaborator (task service or generative service).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed service response: {0}")]
    Decode(String),

    #[error("session {session_id} rejected the request: {reason}")]
    SessionRejected { session_id: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for remote service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Problems reading or writing the test-file format.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("front matter opened with '---' but never closed")]
    UnterminatedFrontMatter,

    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("test case has no task instructions")]
    EmptyInstructions,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
