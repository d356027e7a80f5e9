//! Collaborator traits for the remote services webprobe talks to.
//!
//! - `TaskService`: the remote AI-driven browser task execution service
//! - `CompletionModel`: a generative language service
//!
//! Both traits are async and transport-agnostic. In-memory fakes are
//! provided for testing via the `fakes` module.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domain::error::ServiceResult;

/// Remote session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work submitted into a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Full instruction text, including any preamble and marker clause.
    pub instructions: String,

    /// Model identifier, if the caller wants to override the service default.
    pub llm_model: Option<String>,

    /// Remote identifiers of input artifacts.
    pub input_files: Vec<String>,
}

/// Status values reported by the remote task feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Created,
    Started,
    Paused,
    /// Ran to completion.
    Finished,
    /// Halted early (by the service, a timeout, or a closed session).
    Stopped,
    /// Any value this client does not know about.
    Other(String),
}

impl TaskStatus {
    /// Parse a wire status string (case-insensitive).
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" => TaskStatus::Created,
            "started" | "running" => TaskStatus::Started,
            "paused" => TaskStatus::Paused,
            "finished" => TaskStatus::Finished,
            "stopped" => TaskStatus::Stopped,
            _ => TaskStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Started => "started",
            TaskStatus::Paused => "paused",
            TaskStatus::Finished => "finished",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Other(raw) => raw,
        }
    }

    /// Whether the feed ends after this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Stopped)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of an artifact produced by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub id: String,
    pub file_name: String,
}

/// One item of the status feed.
///
/// `output` and `output_files` are only meaningful on a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub output: Option<String>,
    pub output_files: Vec<OutputFile>,
}

impl TaskUpdate {
    /// A non-terminal update carrying only a status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status,
            output: None,
            output_files: Vec::new(),
        }
    }
}

/// Remote AI-driven browser task execution service.
///
/// Contract:
/// - a session accepts exactly one task; a second submission is rejected.
/// - `status_feed` yields updates until (and including) a terminal status.
/// - `close_session` stops any task still running in the session.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Create a new, exclusive session.
    async fn create_session(&self) -> ServiceResult<SessionId>;

    /// Submit a task into `session`.
    async fn submit_task(&self, session: &SessionId, request: &TaskRequest)
        -> ServiceResult<TaskId>;

    /// Subscribe to status updates for `task`.
    fn status_feed<'a>(&'a self, task: &'a TaskId) -> BoxStream<'a, ServiceResult<TaskUpdate>>;

    /// Obtain a short-lived signed download URL for an output artifact.
    async fn output_file_url(&self, task: &TaskId, file_id: &str) -> ServiceResult<String>;

    /// Fetch the bytes behind a signed URL.
    async fn download(&self, url: &str) -> ServiceResult<Vec<u8>>;

    /// Close (stop) a session.
    async fn close_session(&self, session: &SessionId) -> ServiceResult<()>;
}

/// Generative language service.
///
/// Implementations may return an empty string; callers are expected to treat
/// that as a retryable failure.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> ServiceResult<String>;
}
