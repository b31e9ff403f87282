//! ACP wire types.
//!
//! These mirror the JSON shapes exchanged with an ACP server: run requests,
//! run snapshots, messages and their parts, agent manifests, and the run
//! events carried in the `data` field of each streamed frame.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// How the server should execute a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Block until the run finishes and return the final run snapshot.
    Sync,
    /// Return immediately with the created run.
    Async,
    /// Stream run events as they happen.
    Stream,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Sync => write!(f, "sync"),
            RunMode::Async => write!(f, "async"),
            RunMode::Stream => write!(f, "stream"),
        }
    }
}

/// Lifecycle status of a run as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Run has been accepted.
    Created,
    /// Run is executing.
    InProgress,
    /// Run is waiting for client input.
    Awaiting,
    /// Cancellation was requested.
    Cancelling,
    /// Run was cancelled.
    Cancelled,
    /// Run finished successfully.
    Completed,
    /// Run finished with an error.
    Failed,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether the run can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Completed | RunStatus::Failed
        )
    }
}

// ============================================================================
// Messages
// ============================================================================

fn default_content_type() -> String {
    "text/plain".to_string()
}

/// One ordered piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    /// Optional artifact name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// MIME type of `content`.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Inline content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Encoding of `content` (`plain` or `base64`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,

    /// Reference to out-of-band content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,

    /// Sender role. The wire only knows `user` and `assistant`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl MessagePart {
    /// A plain-text part without a role.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            name: None,
            content_type: default_content_type(),
            content: Some(content.into()),
            content_encoding: None,
            content_url: None,
            role: None,
        }
    }

    /// A plain-text part tagged with a wire role.
    pub fn text_with_role(content: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            ..Self::text(content)
        }
    }

    /// Whether this part carries readable text.
    pub fn is_text(&self) -> bool {
        self.content.is_some() && self.content_type.starts_with("text/")
    }
}

/// A wire message: an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Ordered content parts.
    pub parts: Vec<MessagePart>,

    /// When the server created the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the server finished the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a message from parts.
    pub fn new(parts: Vec<MessagePart>) -> Self {
        Self {
            parts,
            created_at: None,
            completed_at: None,
        }
    }

    /// The role of the first part that declares one.
    pub fn role(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| p.role.as_deref())
    }

    /// Concatenate the inline content of every part, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.content.as_deref())
            .collect()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

// ============================================================================
// Runs
// ============================================================================

/// Error details attached to a failed run or an `error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Snapshot of a run.
///
/// Every field is optional on decode; servers differ in how much of the run
/// they echo in each event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Agent executing the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,

    /// Server-assigned run identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Session the run belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Current status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,

    /// Pending request for client input (`run.awaiting`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub await_request: Option<Value>,

    /// Output messages, in order.
    #[serde(default)]
    pub output: Vec<Message>,

    /// Failure details (`run.failed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    /// When the run was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Concatenate every output message's part contents, in output order then
    /// part order.
    pub fn output_text(&self) -> String {
        self.output.iter().map(Message::text).collect()
    }

    /// Decode a run snapshot, keeping every field that can be read.
    ///
    /// Servers are loose about field types (numeric ids, `null` output, numeric
    /// error codes). Fields of an unexpected shape are dropped instead of
    /// failing the whole snapshot, and scalar ids or codes are stringified.
    pub fn from_value_lossy(value: &Value) -> Self {
        if let Ok(run) = serde_json::from_value::<Run>(value.clone()) {
            return run;
        }
        Self {
            agent_name: scalar(value, "agent_name"),
            run_id: scalar(value, "run_id"),
            session_id: scalar(value, "session_id"),
            status: typed(value, "status"),
            await_request: value.get("await_request").filter(|v| !v.is_null()).cloned(),
            output: value
                .get("output")
                .and_then(Value::as_array)
                .map(|messages| messages.iter().map(Message::from_value_lossy).collect())
                .unwrap_or_default(),
            error: value
                .get("error")
                .filter(|v| v.is_object())
                .map(ErrorInfo::from_value_lossy),
            created_at: typed(value, "created_at"),
            finished_at: typed(value, "finished_at"),
        }
    }
}

impl ErrorInfo {
    /// Decode error details, stringifying a numeric `code` or `message`.
    pub fn from_value_lossy(value: &Value) -> Self {
        Self {
            code: scalar(value, "code"),
            message: scalar(value, "message"),
            data: value.get("data").filter(|v| !v.is_null()).cloned(),
        }
    }
}

impl Message {
    /// Decode a wire message, keeping every part that can be read.
    pub fn from_value_lossy(value: &Value) -> Self {
        if let Ok(message) = serde_json::from_value::<Message>(value.clone()) {
            return message;
        }
        let parts = value
            .get("parts")
            .and_then(Value::as_array)
            .map(|parts| parts.iter().map(MessagePart::from_value_lossy).collect())
            .unwrap_or_default();
        Self {
            parts,
            created_at: typed(value, "created_at"),
            completed_at: typed(value, "completed_at"),
        }
    }
}

impl MessagePart {
    /// Decode a part, stringifying scalar `content`.
    pub fn from_value_lossy(value: &Value) -> Self {
        if let Ok(part) = serde_json::from_value::<MessagePart>(value.clone()) {
            return part;
        }
        Self {
            name: scalar(value, "name"),
            content_type: scalar(value, "content_type").unwrap_or_else(default_content_type),
            content: scalar(value, "content"),
            content_encoding: scalar(value, "content_encoding"),
            content_url: scalar(value, "content_url"),
            role: scalar(value, "role"),
        }
    }
}

/// A string, number or boolean field as a string.
fn scalar(value: &Value, name: &str) -> Option<String> {
    match value.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn typed<T: serde::de::DeserializeOwned>(value: &Value, name: &str) -> Option<T> {
    serde_json::from_value(value.get(name)?.clone()).ok()
}

/// Body of `POST /runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCreateRequest {
    /// Agent to run.
    pub agent_name: String,

    /// Session to attach the run to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,

    /// Input messages.
    pub input: Vec<Message>,

    /// Execution mode.
    pub mode: RunMode,
}

// ============================================================================
// Agents
// ============================================================================

/// Description of an agent hosted by an ACP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentManifest {
    /// Unique agent name.
    pub name: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Server-defined metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Body of `GET /agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsListResponse {
    /// Hosted agents.
    #[serde(default)]
    pub agents: Vec<AgentManifest>,
}

// ============================================================================
// Run events
// ============================================================================

/// Event type tags known to this client.
pub mod event_types {
    /// Run accepted.
    pub const RUN_CREATED: &str = "run.created";
    /// Run executing.
    pub const RUN_IN_PROGRESS: &str = "run.in-progress";
    /// Run waiting for client input.
    pub const RUN_AWAITING: &str = "run.awaiting";
    /// Run finished successfully.
    pub const RUN_COMPLETED: &str = "run.completed";
    /// Run finished with an error.
    pub const RUN_FAILED: &str = "run.failed";
    /// Run was cancelled.
    pub const RUN_CANCELLED: &str = "run.cancelled";
    /// A new output message started.
    pub const MESSAGE_CREATED: &str = "message.created";
    /// One part of the current output message.
    pub const MESSAGE_PART: &str = "message.part";
    /// The current output message is complete.
    pub const MESSAGE_COMPLETED: &str = "message.completed";
    /// Free-form progress payload.
    pub const GENERIC: &str = "generic";
    /// Server-side error outside a run snapshot.
    pub const ERROR: &str = "error";
}

/// A decoded run event.
///
/// The protocol is open-ended: tags this client does not know decode into
/// [`RunEvent::Other`] rather than failing, as do `message.*` and `error`
/// events whose payload does not have the expected shape. `run.*` events are
/// classified by their tag alone; their snapshot is decoded lossily.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// `run.created`
    RunCreated(Run),
    /// `run.in-progress`
    RunInProgress(Run),
    /// `run.awaiting`
    RunAwaiting(Run),
    /// `run.completed`
    RunCompleted(Run),
    /// `run.failed`
    RunFailed(Run),
    /// `run.cancelled`
    RunCancelled(Run),
    /// `message.created`
    MessageCreated(Message),
    /// `message.part`
    MessagePart(MessagePart),
    /// `message.completed`
    MessageCompleted(Message),
    /// `generic`
    Generic(Value),
    /// `error`
    Error(ErrorInfo),
    /// Any other tag, with the payload minus its `type` field.
    Other {
        /// The `type` tag as received (empty when absent).
        kind: String,
        /// The remaining fields.
        payload: Value,
    },
}

impl RunEvent {
    /// Decode an event from the JSON object carried in a frame's `data`.
    pub fn from_value(value: &Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let field = |name: &str| value.get(name).cloned().unwrap_or(Value::Null);
        let run = || Some(value.get("run").map(Run::from_value_lossy).unwrap_or_default());

        let decoded = match kind.as_str() {
            event_types::RUN_CREATED => run().map(RunEvent::RunCreated),
            event_types::RUN_IN_PROGRESS => run().map(RunEvent::RunInProgress),
            event_types::RUN_AWAITING => run().map(RunEvent::RunAwaiting),
            event_types::RUN_COMPLETED => run().map(RunEvent::RunCompleted),
            event_types::RUN_FAILED => run().map(RunEvent::RunFailed),
            event_types::RUN_CANCELLED => run().map(RunEvent::RunCancelled),
            event_types::MESSAGE_CREATED => serde_json::from_value(field("message"))
                .ok()
                .map(RunEvent::MessageCreated),
            event_types::MESSAGE_PART => serde_json::from_value(field("part"))
                .ok()
                .map(RunEvent::MessagePart),
            event_types::MESSAGE_COMPLETED => serde_json::from_value(field("message"))
                .ok()
                .map(RunEvent::MessageCompleted),
            event_types::GENERIC => Some(RunEvent::Generic(field("generic"))),
            event_types::ERROR => value
                .get("error")
                .filter(|v| v.is_object())
                .map(|e| RunEvent::Error(ErrorInfo::from_value_lossy(e))),
            _ => None,
        };

        decoded.unwrap_or_else(|| {
            if !kind.is_empty() && is_known_type(&kind) {
                tracing::warn!(event_type = %kind, "run event payload has unexpected shape");
            }
            RunEvent::Other {
                payload: without_type(value),
                kind,
            }
        })
    }

    /// The `type` tag of this event.
    pub fn kind(&self) -> &str {
        match self {
            RunEvent::RunCreated(_) => event_types::RUN_CREATED,
            RunEvent::RunInProgress(_) => event_types::RUN_IN_PROGRESS,
            RunEvent::RunAwaiting(_) => event_types::RUN_AWAITING,
            RunEvent::RunCompleted(_) => event_types::RUN_COMPLETED,
            RunEvent::RunFailed(_) => event_types::RUN_FAILED,
            RunEvent::RunCancelled(_) => event_types::RUN_CANCELLED,
            RunEvent::MessageCreated(_) => event_types::MESSAGE_CREATED,
            RunEvent::MessagePart(_) => event_types::MESSAGE_PART,
            RunEvent::MessageCompleted(_) => event_types::MESSAGE_COMPLETED,
            RunEvent::Generic(_) => event_types::GENERIC,
            RunEvent::Error(_) => event_types::ERROR,
            RunEvent::Other { kind, .. } => kind,
        }
    }

    /// The run snapshot carried by `run.*` events.
    pub fn run(&self) -> Option<&Run> {
        match self {
            RunEvent::RunCreated(run)
            | RunEvent::RunInProgress(run)
            | RunEvent::RunAwaiting(run)
            | RunEvent::RunCompleted(run)
            | RunEvent::RunFailed(run)
            | RunEvent::RunCancelled(run) => Some(run),
            _ => None,
        }
    }
}

fn is_known_type(kind: &str) -> bool {
    use event_types::*;
    [
        RUN_CREATED,
        RUN_IN_PROGRESS,
        RUN_AWAITING,
        RUN_COMPLETED,
        RUN_FAILED,
        RUN_CANCELLED,
        MESSAGE_CREATED,
        MESSAGE_PART,
        MESSAGE_COMPLETED,
        GENERIC,
        ERROR,
    ]
    .contains(&kind)
}

/// Copy of a JSON object with its `type` field removed.
///
/// Non-object values are returned unchanged.
pub fn without_type(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("type");
            Value::Object(map)
        }
        other => other.clone(),
    }
}
