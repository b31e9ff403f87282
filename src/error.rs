//! ACP error types.
//!
//! Errors fall into four families:
//! - configuration errors (unknown endpoint names, bad headers), which are
//!   programmer errors and never retried
//! - transport errors (connection failures, non-2xx statuses, undecodable
//!   bodies), surfaced to the caller as-is
//! - protocol parse errors (a non-JSON event frame), which are reported through
//!   the run observer while stream consumption continues
//! - run errors (no event received, or `run.failed`), fatal to the current call

/// Default message used when a `run.failed` event carries no error payload.
pub const DEFAULT_RUN_FAILED_MESSAGE: &str = "Something went wrong with the agent communication.";

/// Message used when a run stream ends without a single parseable event.
pub const NO_EVENT_MESSAGE: &str = "No event received from agent.";

/// Message used when the agent-existence probe cannot reach the server.
pub const AGENT_UNREACHABLE_MESSAGE: &str = "Can't connect to ACP agent.";

/// Unified error type for the ACP client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AcpError {
    /// Invalid client configuration: unknown endpoint name, malformed header,
    /// unusable base URL.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport-level error (connection failed, body read failed, etc.).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request or connection timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP error with status code and response body.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// A single-shot response body could not be decoded as JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// An event frame's `data` field was not valid JSON.
    ///
    /// Never returned from a run; delivered to the observer instead.
    #[error("Protocol parse error: {0}")]
    ProtocolParse(String),

    /// The run ended without a usable terminal event, or the agent reported
    /// `run.failed`. The message is meant to be shown to users directly.
    #[error("{0}")]
    Run(String),

    /// The agent server could not be queried at all.
    #[error("Can't connect to ACP agent. ({source})")]
    AgentUnreachable {
        /// The underlying failure.
        #[source]
        source: Box<AcpError>,
    },

    /// A single-shot request was cancelled before it completed.
    #[error("Request cancelled")]
    Cancelled,

    /// A [`Memory`](crate::memory::Memory) implementation rejected a write.
    #[error("Memory error: {0}")]
    Memory(String),

    /// Invalid input handed to a tool.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Catch-all for errors that don't fit other categories.
    #[error("{0}")]
    Other(String),
}

/// Convenience result type for ACP operations.
pub type AcpResult<T> = Result<T, AcpError>;

impl AcpError {
    /// Create a `Run` error with the given message.
    pub fn run(message: impl Into<String>) -> Self {
        Self::Run(message.into())
    }

    /// Create a `Configuration` error with the given message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap any error as the failure of the agent-existence probe.
    pub fn agent_unreachable(source: AcpError) -> Self {
        Self::AgentUnreachable {
            source: Box::new(source),
        }
    }

    /// Returns `true` for the transport family: connection failures,
    /// timeouts, non-2xx statuses and undecodable response bodies.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AcpError::Transport(_)
                | AcpError::Timeout(_)
                | AcpError::Http { .. }
                | AcpError::InvalidJson(_)
        )
    }

    /// Classify a `reqwest` failure, prefixing the message with `context`.
    pub(crate) fn from_reqwest(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AcpError::Timeout(format!("{context} timed out: {err}"))
        } else if err.is_connect() {
            AcpError::Transport(format!("{context}: connection failed: {err}"))
        } else {
            AcpError::Transport(format!("{context} failed: {err}"))
        }
    }
}

impl From<serde_json::Error> for AcpError {
    fn from(err: serde_json::Error) -> Self {
        AcpError::InvalidJson(err.to_string())
    }
}
