//! Well-known names, paths and protocol strings.

/// Endpoint name for run creation and streaming.
pub const RUNS_ENDPOINT: &str = "runs";

/// Endpoint name for agent discovery.
pub const AGENTS_ENDPOINT: &str = "agents";

/// Default relative path of the runs endpoint.
pub const DEFAULT_RUNS_PATH: &str = "/runs";

/// Default relative path of the agents endpoint.
pub const DEFAULT_AGENTS_PATH: &str = "/agents";

/// Wire role for user messages.
pub const USER_ROLE: &str = "user";

/// Wire role for assistant messages.
pub const ASSISTANT_ROLE: &str = "assistant";

/// Sentinel token marking a masked custom role (`#custom_role#<role>#`).
pub const CUSTOM_ROLE_TOKEN: &str = "custom_role";

/// MIME type of streamed run responses.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Notification message for a frame whose data is not JSON.
pub const PARSE_ERROR_MESSAGE: &str = "Error parsing JSON";

/// Result text used when a run ends on an event the client does not classify.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response from agent.";
