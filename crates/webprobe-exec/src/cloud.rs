//! HTTP client for the Browser Use cloud API.
//!
//! Implements [`TaskService`] over the v2 REST endpoints. The status feed is
//! produced by polling the task until it reaches a terminal status.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;
use webprobe_core::{
    OutputFile, ServiceError, ServiceResult, SessionId, TaskId, TaskRequest, TaskService,
    TaskStatus, TaskUpdate,
};

use crate::error::ClientError;

const API_KEY_HEADER: &str = "x-browser-use-api-key";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskBody<'a> {
    task: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    llm: Option<&'a str>,
    session_id: &'a str,
    #[serde(skip_serializing_if = "no_files")]
    input_files: &'a [String],
}

fn no_files(files: &&[String]) -> bool {
    files.is_empty()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOutputFile {
    id: String,
    file_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskView {
    status: String,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    output_files: Vec<WireOutputFile>,
}

impl From<TaskView> for TaskUpdate {
    fn from(view: TaskView) -> Self {
        TaskUpdate {
            status: TaskStatus::parse(&view.status),
            output: view.output,
            output_files: view
                .output_files
                .into_iter()
                .map(|f| OutputFile {
                    id: f.id,
                    file_name: f.file_name,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadView {
    download_url: String,
}

/// Browser Use API client.
#[derive(Debug, Clone)]
pub struct BrowserUseClient {
    base_url: String,
    http: reqwest::Client,
    poll_interval: Duration,
}

impl BrowserUseClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(api_key)?);
        let http = reqwest::Client::builder()
            .user_agent(concat!("webprobe/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the task polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fetch_task(&self, task: &TaskId) -> ServiceResult<TaskUpdate> {
        let resp = self
            .http
            .get(self.url(&format!("tasks/{}", task.0)))
            .send()
            .await
            .map_err(transport)?;
        let view: TaskView = decode(resp).await?;
        Ok(view.into())
    }
}

fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::Transport(e.to_string())
}

async fn check(resp: reqwest::Response) -> ServiceResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ServiceError::NotFound(body));
    }
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> ServiceResult<T> {
    let resp = check(resp).await?;
    let bytes = resp.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// State carried between polls.
enum Poll {
    Waiting,
    Done,
}

#[async_trait]
impl TaskService for BrowserUseClient {
    async fn create_session(&self) -> ServiceResult<SessionId> {
        let resp = self
            .http
            .post(self.url("sessions"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(transport)?;
        let created: IdResponse = decode(resp).await?;
        debug!(session_id = %created.id, "created remote session");
        Ok(SessionId(created.id))
    }

    async fn submit_task(
        &self,
        session: &SessionId,
        request: &TaskRequest,
    ) -> ServiceResult<TaskId> {
        let body = CreateTaskBody {
            task: &request.instructions,
            llm: request.llm_model.as_deref(),
            session_id: &session.0,
            input_files: &request.input_files,
        };
        let resp = self
            .http
            .post(self.url("tasks"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let created: IdResponse = decode(resp).await.map_err(|e| match e {
            ServiceError::Status { status: 409, body } => ServiceError::SessionRejected {
                session_id: session.0.clone(),
                reason: body,
            },
            other => other,
        })?;
        Ok(TaskId(created.id))
    }

    fn status_feed<'a>(&'a self, task: &'a TaskId) -> BoxStream<'a, ServiceResult<TaskUpdate>> {
        stream::unfold((Poll::Waiting, true), move |(state, first)| async move {
            if let Poll::Done = state {
                return None;
            }
            if !first {
                tokio::time::sleep(self.poll_interval).await;
            }
            match self.fetch_task(task).await {
                Ok(update) => {
                    // Unknown statuses end the feed too; the executor settles them as errors.
                    let in_progress = matches!(
                        update.status,
                        TaskStatus::Created | TaskStatus::Started | TaskStatus::Paused
                    );
                    let next = if in_progress { Poll::Waiting } else { Poll::Done };
                    Some((Ok(update), (next, false)))
                }
                Err(e) => Some((Err(e), (Poll::Done, false))),
            }
        })
        .boxed()
    }

    async fn output_file_url(&self, task: &TaskId, file_id: &str) -> ServiceResult<String> {
        let resp = self
            .http
            .get(self.url(&format!("files/tasks/{}/output-files/{}", task.0, file_id)))
            .send()
            .await
            .map_err(transport)?;
        let view: DownloadView = decode(resp).await?;
        Ok(view.download_url)
    }

    async fn download(&self, url: &str) -> ServiceResult<Vec<u8>> {
        // Signed URLs must not carry the API key header.
        let resp = reqwest::get(url).await.map_err(transport)?;
        let resp = check(resp).await?;
        let bytes = resp.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn close_session(&self, session: &SessionId) -> ServiceResult<()> {
        let resp = self
            .http
            .patch(self.url(&format!("sessions/{}", session.0)))
            .json(&serde_json::json!({ "action": "stop" }))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joining() {
        let client = BrowserUseClient::new("https://api.example.com/api/v2/", "key").unwrap();
        assert_eq!(client.url("/tasks/abc"), "https://api.example.com/api/v2/tasks/abc");
        assert_eq!(client.url("sessions"), "https://api.example.com/api/v2/sessions");
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(matches!(
            BrowserUseClient::new("https://api.example.com", "bad\nkey"),
            Err(ClientError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_create_task_body_shape() {
        let files = vec!["file-1".to_string()];
        let body = CreateTaskBody {
            task: "Open the page",
            llm: Some("browser-use-llm"),
            session_id: "sess-1",
            input_files: &files,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "task": "Open the page",
                "llm": "browser-use-llm",
                "sessionId": "sess-1",
                "inputFiles": ["file-1"]
            })
        );

        let bare = CreateTaskBody {
            task: "x",
            llm: None,
            session_id: "s",
            input_files: &[],
        };
        assert_eq!(
            serde_json::to_value(&bare).unwrap(),
            json!({ "task": "x", "sessionId": "s" })
        );
    }

    #[test]
    fn test_task_view_decodes_terminal_update() {
        let view: TaskView = serde_json::from_value(json!({
            "id": "task-1",
            "sessionId": "sess-1",
            "status": "finished",
            "output": "Done. <status>completed</status>",
            "outputFiles": [{ "id": "f1", "fileName": "report.pdf" }],
            "steps": []
        }))
        .unwrap();
        let update: TaskUpdate = view.into();
        assert_eq!(update.status, TaskStatus::Finished);
        assert_eq!(update.output.as_deref(), Some("Done. <status>completed</status>"));
        assert_eq!(
            update.output_files,
            vec![OutputFile {
                id: "f1".to_string(),
                file_name: "report.pdf".to_string()
            }]
        );
    }

    #[test]
    fn test_task_view_tolerates_missing_fields() {
        let view: TaskView = serde_json::from_value(json!({ "status": "started", "output": null }))
            .unwrap();
        let update: TaskUpdate = view.into();
        assert_eq!(update.status, TaskStatus::Started);
        assert!(update.output.is_none());
        assert!(update.output_files.is_empty());
    }
}
