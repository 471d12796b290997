use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logs::LogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Uploading,
    RateLimited,
    Succeeded,
    Failed,
}

/// One queued statement file. Jobs are processed strictly in creation order.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: u32,
    pub name: String,
    pub path: PathBuf,
    pub state: JobState,
}

impl UploadJob {
    pub fn new(id: u32, path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            id,
            name,
            path,
            state: JobState::Queued,
        }
    }
}

/// JSON body of an upload reply, shared by the processing service and the
/// relay gateway. All fields are optional; which ones are present depends on
/// the HTTP status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

/// Raw result of one upload request: HTTP status plus parsed body, handed
/// verbatim to `outcome::interpret`.
#[derive(Debug, Clone)]
pub struct UploadReply {
    pub status: u16,
    pub body: ReplyBody,
}

/// Reply from `GET /api/status`. Extra fields (`details`, ...) are ignored;
/// only the `status` string drives the poller.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReply {
    #[serde(default)]
    pub status: String,
}

impl StatusReply {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Uploading,
    RateLimited,
    Failed,
}

/// Events emitted by the orchestrator, consumed by the terminal renderer or
/// a test harness.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    PhaseChanged {
        phase: Phase,
        /// True while the run is parked on the retry poller.
        waiting_on_retry: bool,
    },
    LogAppended(LogEntry),
    Completed { processed: usize },
    Failed { message: String },
}
