//! Hawkeye inference API surface.
//!
//! Request and response shapes for the REST endpoints the relay consumes,
//! plus the [`InferenceApi`] trait that the session bootstrap drives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::Result;

pub const LOGIN_PATH: &str = "/api/v1/user/login";
pub const PROJECTS_PATH: &str = "/api/v1/project";
pub const NEW_SESSION_PATH: &str = "/api/v1/inference/new_session";
pub const SESSION_PATH: &str = "/api/v1/inference/session";
pub const SESSION_LIST_PATH: &str = "/api/v1/inference/session/list";
pub const SESSION_INSPECT_PATH: &str = "/api/v1/inference/session/inspect";

pub const ACTION_NEXT: &str = "ACTION_NEXT";
pub const CONTENT_TYPE_CHAT_PROMPT: &str = "CONTENT_TYPE_CHAT_PROMPT";
pub const STATUS_DONE: &str = "STATUS_DONE";

/// Operations the relay needs from the Hawkeye service.
///
/// Implementations report every failure (transport, non-success status or a
/// missing response field) as an `Err`; callers decide how to degrade.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceApi: Send + Sync {
    /// Exchanges credentials for an access token.
    async fn login(&self, email: &str, password: &str) -> Result<String>;

    /// Lists every project visible to the token holder.
    async fn list_projects(&self, token: &str) -> Result<Vec<Project>>;

    /// Opens a session and returns its identifier.
    async fn new_session(&self, token: &str, request: &NewSessionRequest) -> Result<String>;

    /// Pushes messages into an open session.
    async fn advance_session(
        &self,
        token: &str,
        request: &AdvanceSessionRequest,
    ) -> Result<AdvanceReceipt>;

    async fn list_sessions(&self, token: &str, query: &SessionQuery) -> Result<Vec<SessionSummary>>;

    async fn inspect_session(&self, token: &str, query: &SessionQuery) -> Result<SessionInspection>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectList {
    pub specs: Option<Vec<Project>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Project {
    pub name: Option<String>,
    pub uuid: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Remaining descriptive fields (timestamps, project/sync/training state).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Project {
    /// Renders an extra field as text, if present and not null.
    pub fn field(&self, key: &str) -> Option<String> {
        match self.extra.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Correlation envelope used by the session endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub request_id: Uuid,
}

impl RequestEnvelope {
    pub fn generate() -> Self {
        Self {
            request_id: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecRef {
    pub uuid: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSessionRequest {
    pub filter_chain: Option<Value>,
    pub gendb_spec: SpecRef,
    pub organization_uuid: String,
    pub project_uuid: String,
    pub request: RequestEnvelope,
}

impl NewSessionRequest {
    /// Builds a request with a fresh request id and placeholder spec id.
    pub fn new(organization: &str, project_uuid: &str) -> Self {
        Self {
            filter_chain: None,
            gendb_spec: SpecRef {
                uuid: Uuid::new_v4(),
            },
            organization_uuid: organization.to_string(),
            project_uuid: project_uuid.to_string(),
            request: RequestEnvelope::generate(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewSessionResponse {
    pub session_uuid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageContent {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub parts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn prompt(text: &str) -> Self {
        Self {
            content: MessageContent {
                content_type: CONTENT_TYPE_CHAT_PROMPT.to_string(),
                parts: vec![text.to_string()],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PromptOptions {
    pub disable_replay: bool,
    pub source_focus_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvanceSessionRequest {
    pub action: String,
    pub session_uuid: String,
    pub project_uuid: String,
    pub messages: Vec<ChatMessage>,
    pub request: RequestEnvelope,
    pub prompt_options: PromptOptions,
}

impl AdvanceSessionRequest {
    /// A single chat prompt, tagged with a fresh request id.
    pub fn prompt(session_uuid: &str, project_uuid: &str, text: &str) -> Self {
        Self {
            action: ACTION_NEXT.to_string(),
            session_uuid: session_uuid.to_string(),
            project_uuid: project_uuid.to_string(),
            messages: vec![ChatMessage::prompt(text)],
            request: RequestEnvelope::generate(),
            prompt_options: PromptOptions::default(),
        }
    }

    pub fn prompt_text(&self) -> Option<&str> {
        self.messages
            .first()
            .and_then(|m| m.content.parts.first())
            .map(String::as_str)
    }
}

/// What the relay learned from submitting a prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdvanceReceipt {
    /// Number of `data:` events read; zero when the stream was discarded.
    pub events: usize,
    pub message_id: Option<String>,
    /// Whether a message reported `STATUS_DONE`.
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct StreamEvent {
    pub session_uuid: Option<String>,
    pub message: Option<StreamMessage>,
}

#[derive(Debug, Deserialize)]
pub struct StreamMessage {
    pub id: Option<String>,
    pub status: Option<String>,
    pub content: Option<MessageContent>,
}

impl AdvanceReceipt {
    /// Folds one line of the streamed reply into the receipt.
    ///
    /// Lines that are not `data:` events, or whose payload is not JSON, are
    /// ignored.
    pub fn observe_line(&mut self, line: &str) {
        let Some(payload) = line.trim().strip_prefix("data:") else {
            return;
        };
        let Ok(event) = serde_json::from_str::<StreamEvent>(payload.trim()) else {
            return;
        };
        self.events += 1;

        if let Some(message) = event.message {
            if message.id.is_some() {
                self.message_id = message.id;
            }
            if message.status.as_deref() == Some(STATUS_DONE) {
                self.completed = true;
            }
        }
    }
}

/// Envelope shared by the session list and inspect endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionQuery {
    pub request: QueryEnvelope,
    pub project_uuid: String,
    pub organization_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_uuid: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryEnvelope {
    pub id: Uuid,
}

impl SessionQuery {
    pub fn list(project_uuid: &str, organization: &str) -> Self {
        Self {
            request: QueryEnvelope { id: Uuid::new_v4() },
            project_uuid: project_uuid.to_string(),
            organization_uuid: organization.to_string(),
            session_uuid: None,
        }
    }

    pub fn inspect(session_uuid: &str, project_uuid: &str, organization: &str) -> Self {
        Self {
            session_uuid: Some(session_uuid.to_string()),
            ..Self::list(project_uuid, organization)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionList {
    pub sessions: Option<Vec<SessionSummary>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionSummary {
    pub name: Option<String>,
    pub session_uuid: Option<String>,
    pub create_time: Option<String>,
    pub last_update: Option<String>,
    #[serde(default)]
    pub prompt_cycle_ids: Option<Vec<Value>>,
}

impl SessionSummary {
    pub fn prompt_cycle_count(&self) -> usize {
        self.prompt_cycle_ids.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionInspection {
    #[serde(default)]
    pub session_info: Value,
    #[serde(default)]
    pub prompt_cycle: Option<Vec<PromptCycle>>,
}

impl SessionInspection {
    pub fn cycles(&self) -> &[PromptCycle] {
        self.prompt_cycle.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptCycle {
    pub id: Option<String>,
    pub status: Option<String>,
    pub request: Option<CycleRequest>,
    pub final_answer: Option<String>,
    pub chain_of_thoughts: Option<Vec<ThoughtStep>>,
    pub sources: Option<Vec<CycleSource>>,
    pub follow_up_suggestions: Option<Vec<String>>,
}

impl PromptCycle {
    /// The prompt text that opened this cycle.
    pub fn question(&self) -> Option<&str> {
        self.request
            .as_ref()?
            .messages
            .as_ref()?
            .first()?
            .content
            .parts
            .first()
            .map(String::as_str)
    }

    /// The final answer from its `**Analysis:**` heading onwards, when present.
    pub fn analysis(&self) -> Option<&str> {
        let answer = self.final_answer.as_deref()?;
        Some(match answer.find("**Analysis:**") {
            Some(idx) => &answer[idx..],
            None => answer,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CycleRequest {
    pub messages: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThoughtStep {
    pub description: Option<String>,
    pub investigation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CycleSource {
    pub title: Option<String>,
    pub id: Option<String>,
}

/// Rewrites the service's `DD/MM/YY HH:MM:SS.ffffff` timestamps as
/// `YYYY-MM-DD HH:MM:SS.ffffff`; anything else is returned unchanged.
pub fn format_timestamp(raw: &str) -> String {
    chrono::NaiveDateTime::parse_from_str(raw.trim(), "%d/%m/%y %H:%M:%S%.f")
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
