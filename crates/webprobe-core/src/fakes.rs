//! In-memory fakes for the service traits (testing only)
//!
//! Provides `FakeTaskService` and `ScriptedCompletionModel` that satisfy the
//! trait contracts without any network access.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::domain::error::{ServiceError, ServiceResult};
use crate::service::*;

// ---------------------------------------------------------------------------
// FakeTaskService
// ---------------------------------------------------------------------------

/// Scripted behaviour of one fake task.
#[derive(Debug, Clone)]
pub struct FakeScript {
    /// Statuses emitted by the feed, in order.
    pub statuses: Vec<TaskStatus>,
    /// Output text attached to the last update.
    pub output: String,
    /// Artifacts attached to the last update; `None` bytes make the download fail.
    pub output_files: Vec<(String, Option<Vec<u8>>)>,
    /// Delay before each feed item.
    pub step_delay: Duration,
    /// Reject the submission with an HTTP 500.
    pub fail_submit: bool,
    /// Panic while producing the feed.
    pub panic_in_feed: bool,
}

impl FakeScript {
    /// created → started → finished, with `output` as final text.
    pub fn finished(output: impl Into<String>) -> Self {
        Self {
            statuses: vec![TaskStatus::Created, TaskStatus::Started, TaskStatus::Finished],
            output: output.into(),
            output_files: Vec::new(),
            step_delay: Duration::from_millis(10),
            fail_submit: false,
            panic_in_feed: false,
        }
    }

    /// created → started → stopped.
    pub fn stopped() -> Self {
        Self {
            statuses: vec![TaskStatus::Created, TaskStatus::Started, TaskStatus::Stopped],
            ..Self::finished("")
        }
    }

    /// Replace the emitted statuses.
    pub fn with_statuses(mut self, statuses: Vec<TaskStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_output_file(mut self, file_name: &str, bytes: &[u8]) -> Self {
        self.output_files.push((file_name.to_string(), Some(bytes.to_vec())));
        self
    }

    pub fn with_broken_output_file(mut self, file_name: &str) -> Self {
        self.output_files.push((file_name.to_string(), None));
        self
    }

    pub fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_in_feed = true;
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    open: HashSet<String>,
    session_tasks: HashMap<String, String>,
    tasks: HashMap<String, (FakeScript, Vec<OutputFile>)>,
    files: HashMap<String, Option<Vec<u8>>>,
    sessions_created: u64,
    close_calls: HashMap<String, u32>,
    max_open: usize,
    submitted: Vec<TaskRequest>,
}

/// In-memory task service driven by per-test scripts.
///
/// A script is selected by the first registered needle contained in the
/// submitted instruction text; otherwise the default script is used.
#[derive(Debug)]
pub struct FakeTaskService {
    default_script: FakeScript,
    scripts: Vec<(String, FakeScript)>,
    fail_create: bool,
    create_delay: Duration,
    close_delay: Duration,
    state: Mutex<FakeState>,
}

impl FakeTaskService {
    pub fn new(default_script: FakeScript) -> Self {
        Self {
            default_script,
            scripts: Vec::new(),
            fail_create: false,
            create_delay: Duration::ZERO,
            close_delay: Duration::ZERO,
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Use `script` for tasks whose instructions contain `needle`.
    pub fn with_script(mut self, needle: &str, script: FakeScript) -> Self {
        self.scripts.push((needle.to_string(), script));
        self
    }

    /// Make every `create_session` call fail.
    pub fn failing_sessions(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Delay every `create_session` and `close_session` call. The remote
    /// side of each call takes effect once its delay has elapsed.
    pub fn with_session_latency(mut self, create: Duration, close: Duration) -> Self {
        self.create_delay = create;
        self.close_delay = close;
        self
    }

    pub fn sessions_created(&self) -> u64 {
        self.state.lock().unwrap().sessions_created
    }

    /// Total number of `close_session` calls.
    pub fn close_calls(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state.close_calls.values().map(|n| u64::from(*n)).sum()
    }

    /// Number of `close_session` calls for one session.
    pub fn close_calls_for(&self, session: &str) -> u32 {
        let state = self.state.lock().unwrap();
        state.close_calls.get(session).copied().unwrap_or(0)
    }

    /// Sessions created and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    /// Highest number of simultaneously open sessions observed.
    pub fn max_concurrent_sessions(&self) -> usize {
        self.state.lock().unwrap().max_open
    }

    pub fn submitted_requests(&self) -> Vec<TaskRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn script_for(&self, instructions: &str) -> FakeScript {
        self.scripts
            .iter()
            .find(|(needle, _)| instructions.contains(needle.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_else(|| self.default_script.clone())
    }
}

#[async_trait]
impl TaskService for FakeTaskService {
    async fn create_session(&self) -> ServiceResult<SessionId> {
        tokio::task::yield_now().await;
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        if self.fail_create {
            return Err(ServiceError::Transport("connection refused".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.sessions_created += 1;
        let id = format!("session-{}", state.next_id);
        state.open.insert(id.clone());
        state.max_open = state.max_open.max(state.open.len());
        Ok(SessionId(id))
    }

    async fn submit_task(
        &self,
        session: &SessionId,
        request: &TaskRequest,
    ) -> ServiceResult<TaskId> {
        let script = self.script_for(&request.instructions);
        let mut state = self.state.lock().unwrap();
        if !state.open.contains(&session.0) {
            return Err(ServiceError::SessionRejected {
                session_id: session.0.clone(),
                reason: "session is closed".to_string(),
            });
        }
        if state.session_tasks.contains_key(&session.0) {
            return Err(ServiceError::SessionRejected {
                session_id: session.0.clone(),
                reason: "session already has an active task".to_string(),
            });
        }
        state.submitted.push(request.clone());
        if script.fail_submit {
            return Err(ServiceError::Status {
                status: 500,
                body: "task submission failed".to_string(),
            });
        }

        state.next_id += 1;
        let task_id = format!("task-{}", state.next_id);
        let mut files = Vec::new();
        for (i, (file_name, bytes)) in script.output_files.iter().enumerate() {
            let file = OutputFile {
                id: format!("{task_id}-file-{i}"),
                file_name: file_name.clone(),
            };
            state
                .files
                .insert(format!("fake://{task_id}/{}", file.id), bytes.clone());
            files.push(file);
        }
        state
            .session_tasks
            .insert(session.0.clone(), task_id.clone());
        state.tasks.insert(task_id.clone(), (script, files));
        Ok(TaskId(task_id))
    }

    fn status_feed<'a>(&'a self, task: &'a TaskId) -> BoxStream<'a, ServiceResult<TaskUpdate>> {
        let entry = self.state.lock().unwrap().tasks.get(&task.0).cloned();
        let Some((script, files)) = entry else {
            return stream::once(async move {
                Err::<TaskUpdate, _>(ServiceError::NotFound(task.0.clone()))
            })
            .boxed();
        };

        let last = script.statuses.len().saturating_sub(1);
        let delay = script.step_delay;
        let items: Vec<TaskUpdate> = script
            .statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                if i == last {
                    TaskUpdate {
                        status: status.clone(),
                        output: Some(script.output.clone()),
                        output_files: files.clone(),
                    }
                } else {
                    TaskUpdate::status(status.clone())
                }
            })
            .collect();
        let panic_in_feed = script.panic_in_feed;

        stream::iter(items)
            .then(move |update| async move {
                tokio::time::sleep(delay).await;
                if panic_in_feed {
                    panic!("fake feed exploded");
                }
                Ok(update)
            })
            .boxed()
    }

    async fn output_file_url(&self, task: &TaskId, file_id: &str) -> ServiceResult<String> {
        let url = format!("fake://{}/{}", task.0, file_id);
        let state = self.state.lock().unwrap();
        if state.files.contains_key(&url) {
            Ok(url)
        } else {
            Err(ServiceError::NotFound(file_id.to_string()))
        }
    }

    async fn download(&self, url: &str) -> ServiceResult<Vec<u8>> {
        let state = self.state.lock().unwrap();
        match state.files.get(url) {
            Some(Some(bytes)) => Ok(bytes.clone()),
            Some(None) => Err(ServiceError::Status {
                status: 403,
                body: "signed URL expired".to_string(),
            }),
            None => Err(ServiceError::NotFound(url.to_string())),
        }
    }

    async fn close_session(&self, session: &SessionId) -> ServiceResult<()> {
        tokio::task::yield_now().await;
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        let mut state = self.state.lock().unwrap();
        *state.close_calls.entry(session.0.clone()).or_insert(0) += 1;
        state.open.remove(&session.0);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedCompletionModel
// ---------------------------------------------------------------------------

/// Completion model that replays a fixed list of responses, one per call.
#[derive(Debug, Default)]
pub struct ScriptedCompletionModel {
    responses: Mutex<VecDeque<ServiceResult<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletionModel {
    pub fn new(responses: Vec<ServiceResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletionModel {
    async fn complete(&self, prompt: &str, _model: &str) -> ServiceResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Transport("no scripted response left".into())))
    }
}
