//! Session-scoped task executor.
//!
//! Each test owns one remote session from creation to close:
//!
//! ```text
//! Created → SessionOpen → TaskSubmitted → Streaming → {Finished | Stopped} → SessionClosed
//! ```
//!
//! The session is released on every exit path of the test body, including
//! errors and panics. If the whole run is cancelled the future is dropped
//! mid-flight and the [`SessionRegistry`] closes whatever is left.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use webprobe_core::{
    ExecutionResult, RunnerConfig, SessionId, TaskRequest, TaskStatus, TestSpecification,
    TestStatus,
};

use crate::artifacts::save_output_files;
use crate::error::{ExecResult, ExecutionError};
use crate::outcome::{marker_clause, resolve};
use crate::registry::SessionRegistry;

/// Settings the executor needs from the run configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    pub deployment_url: Option<String>,
    pub save_outputs: bool,
    pub output_dir: PathBuf,
}

impl From<&RunnerConfig> for ExecutorConfig {
    fn from(cfg: &RunnerConfig) -> Self {
        Self {
            deployment_url: cfg.deployment_url.clone(),
            save_outputs: cfg.save_outputs,
            output_dir: cfg.output_dir.clone(),
        }
    }
}

/// Runs one test specification inside its own remote session.
pub struct SessionExecutor {
    registry: Arc<SessionRegistry>,
    config: ExecutorConfig,
}

impl SessionExecutor {
    pub fn new(registry: Arc<SessionRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Full instruction text sent to the remote agent.
    pub fn build_instructions(&self, spec: &TestSpecification) -> String {
        let mut text = String::new();
        if let Some(url) = &self.config.deployment_url {
            text.push_str(&format!(
                "The application under test is deployed at {url}. Start there.\n\n"
            ));
        }
        text.push_str(spec.instructions.trim());
        text.push_str("\n\n");
        if let Some(expected) = &spec.expected_output {
            text.push_str(&format!("Expected outcome: {}\n\n", expected.trim()));
        }
        text.push_str(&marker_clause());
        text
    }

    /// Execute `spec`, the test at `slot` in the run list, and settle its
    /// result. Never fails: every problem is recorded on the returned result.
    #[instrument(skip_all, fields(slot = slot, test = %spec.name))]
    pub async fn execute(&self, slot: usize, spec: &TestSpecification) -> ExecutionResult {
        let started = Instant::now();
        let mut result = ExecutionResult::pending(spec);

        let session = match self.registry.open(&spec.name).await {
            Ok(session) => session,
            Err(e) => {
                let err = ExecutionError::SessionCreate(e);
                warn!(error = %err, "test errored");
                result.status = TestStatus::Error;
                result.error = Some(err.to_string());
                result.duration_secs = started.elapsed().as_secs_f64();
                return result;
            }
        };
        result.session_id = Some(session.0.clone());
        info!(session_id = %session, "session opened");

        let body = AssertUnwindSafe(self.run_in_session(slot, spec, &session, &mut result, started))
            .catch_unwind()
            .await;
        self.registry.release(&session).await;

        let failure = match body {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => Some(ExecutionError::Panicked(panic_text(payload))),
        };
        if let Some(err) = failure {
            warn!(error = %err, "test errored");
            result.status = TestStatus::Error;
            result.error = Some(err.to_string());
        }

        result.duration_secs = started.elapsed().as_secs_f64();
        info!(
            status = %result.status,
            duration_secs = result.duration_secs,
            "test settled"
        );
        result
    }

    async fn run_in_session(
        &self,
        slot: usize,
        spec: &TestSpecification,
        session: &SessionId,
        result: &mut ExecutionResult,
        started: Instant,
    ) -> ExecResult<()> {
        let service = self.registry.service();
        let request = TaskRequest {
            instructions: self.build_instructions(spec),
            llm_model: Some(spec.llm_model.clone()),
            input_files: spec.input_files.clone(),
        };

        let task = service
            .submit_task(session, &request)
            .await
            .map_err(ExecutionError::Submit)?;
        result.task_id = Some(task.0.clone());
        info!(task_id = %task, "task submitted");

        let mut last: Option<TaskStatus> = None;
        let mut output = None;
        let mut output_files = Vec::new();
        {
            let mut feed = service.status_feed(&task);
            while let Some(update) = feed.next().await {
                let update = update.map_err(ExecutionError::Feed)?;
                if last.as_ref() != Some(&update.status) {
                    info!(task_id = %task, status = %update.status, "task status");
                }
                let terminal = update.status.is_terminal();
                last = Some(update.status);
                if terminal {
                    output = update.output;
                    output_files = update.output_files;
                    break;
                }
            }
        }

        let resolution = resolve(
            last.as_ref(),
            output.as_deref(),
            started.elapsed(),
            spec.timeout(),
        );
        if resolution.missing_marker {
            warn!(task_id = %task, "no completion marker in output, treating as passed");
        }
        result.status = resolution.status;
        result.error = resolution.error;
        result.output = output;
        result.output_file_ids = output_files.iter().map(|f| f.id.clone()).collect();

        if result.status == TestStatus::Passed && self.config.save_outputs && !output_files.is_empty()
        {
            result.output_files = save_output_files(
                service.as_ref(),
                &task,
                slot,
                &spec.name,
                &output_files,
                &self.config.output_dir,
            )
            .await;
        }
        Ok(())
    }
}

fn panic_text(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
