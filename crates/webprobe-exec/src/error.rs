//! Error types for test execution.

use webprobe_core::ServiceError;

/// Failures local to one test. Always converted into an `error` result at the
/// executor boundary; never aborts sibling tests.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to create session: {0}")]
    SessionCreate(#[source] ServiceError),

    #[error("failed to submit task: {0}")]
    Submit(#[source] ServiceError),

    #[error("status feed failed: {0}")]
    Feed(#[source] ServiceError),

    #[error("unexpected terminal status: {0}")]
    UnexpectedTerminal(String),

    #[error("test body panicked: {0}")]
    Panicked(String),
}

/// Errors building or talking through the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),

    #[error("invalid API key header: {0}")]
    InvalidKey(#[from] reqwest::header::InvalidHeaderValue),
}

/// Result type for execution operations.
pub type ExecResult<T> = std::result::Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_service_detail() {
        let err = ExecutionError::Submit(ServiceError::Status {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "failed to submit task: service returned HTTP 500: boom"
        );
        assert_eq!(
            ExecutionError::UnexpectedTerminal("exploded".to_string()).to_string(),
            "unexpected terminal status: exploded"
        );
    }
}
