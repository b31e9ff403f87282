//! Remote agent façade.
//!
//! [`RemoteAgent`] drives one agent on an ACP server: it converts input into
//! wire messages, streams the run, forwards notifications to the caller's
//! observer, and on success records the turn in conversation memory.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapter;
use crate::client::{build_run_request, AcpClient, TransportConfig};
use crate::error::{AcpError, AcpResult, NO_EVENT_MESSAGE};
use crate::memory::Memory;
use crate::message::Message;
use crate::run::{consume_run, ReceivedEvent, RunClassification, RunObserver, RunState};
use crate::types::Message as WireMessage;
use crate::utils::constants::NO_RESPONSE_PLACEHOLDER;
use crate::utils::message::user_text_message;

/// One input item for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentInput {
    /// Plain text, sent as a user message.
    Text(String),
    /// A domain message; custom roles are masked on the wire.
    Message(Message),
    /// A message already in wire shape, sent unchanged.
    Wire(WireMessage),
}

impl AgentInput {
    /// The wire message sent for this input.
    pub fn to_wire(&self) -> WireMessage {
        match self {
            AgentInput::Text(text) => user_text_message(text.clone()),
            AgentInput::Message(message) => adapter::encode(message),
            AgentInput::Wire(wire) => wire.clone(),
        }
    }

    /// The domain message recorded in memory for this input.
    pub fn to_message(&self) -> Message {
        match self {
            AgentInput::Text(text) => Message::user(text.clone()),
            AgentInput::Message(message) => message.clone(),
            AgentInput::Wire(wire) => Message::user(wire.text()),
        }
    }
}

impl From<&str> for AgentInput {
    fn from(value: &str) -> Self {
        AgentInput::Text(value.to_string())
    }
}

impl From<String> for AgentInput {
    fn from(value: String) -> Self {
        AgentInput::Text(value)
    }
}

impl From<Message> for AgentInput {
    fn from(value: Message) -> Self {
        AgentInput::Message(value)
    }
}

impl From<WireMessage> for AgentInput {
    fn from(value: WireMessage) -> Self {
        AgentInput::Wire(value)
    }
}

/// The full input of a run: one or many items.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInput(pub Vec<AgentInput>);

impl RunInput {
    /// The input items.
    pub fn items(&self) -> &[AgentInput] {
        &self.0
    }
}

impl From<AgentInput> for RunInput {
    fn from(value: AgentInput) -> Self {
        RunInput(vec![value])
    }
}

impl From<&str> for RunInput {
    fn from(value: &str) -> Self {
        RunInput(vec![value.into()])
    }
}

impl From<String> for RunInput {
    fn from(value: String) -> Self {
        RunInput(vec![value.into()])
    }
}

impl From<Message> for RunInput {
    fn from(value: Message) -> Self {
        RunInput(vec![value.into()])
    }
}

impl From<WireMessage> for RunInput {
    fn from(value: WireMessage) -> Self {
        RunInput(vec![value.into()])
    }
}

impl From<Vec<AgentInput>> for RunInput {
    fn from(value: Vec<AgentInput>) -> Self {
        RunInput(value)
    }
}

impl From<Vec<Message>> for RunInput {
    fn from(value: Vec<Message>) -> Self {
        RunInput(value.into_iter().map(AgentInput::from).collect())
    }
}

impl From<Vec<String>> for RunInput {
    fn from(value: Vec<String>) -> Self {
        RunInput(value.into_iter().map(AgentInput::from).collect())
    }
}

impl From<Vec<&str>> for RunInput {
    fn from(value: Vec<&str>) -> Self {
        RunInput(value.into_iter().map(AgentInput::from).collect())
    }
}

/// Result of a successful [`RemoteAgent::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAgentOutput {
    /// The assistant's reply.
    pub result: Message,
    /// The terminal event the reply was taken from.
    pub event: ReceivedEvent,
}

/// A remote agent reachable over ACP.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use acp_rs::agent::RemoteAgent;
/// use acp_rs::memory::UnconstrainedMemory;
/// use acp_rs::run::RunNotification;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let memory = Arc::new(UnconstrainedMemory::new());
/// let agent = RemoteAgent::new("gpt-researcher", "http://127.0.0.1:8333/api/v1/acp", memory);
///
/// let output = agent
///     .run("Connemara", &mut |n: RunNotification| println!("{n:?}"))
///     .await?;
/// println!("{}", output.result.text());
/// # Ok(())
/// # }
/// ```
pub struct RemoteAgent {
    agent_name: String,
    url: String,
    memory: Arc<dyn Memory>,
    config: TransportConfig,
    session_id: Option<Uuid>,
    client: OnceLock<AcpClient>,
}

impl std::fmt::Debug for RemoteAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAgent")
            .field("agent_name", &self.agent_name)
            .field("url", &self.url)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl RemoteAgent {
    /// Create an agent handle. No connection is made until first use.
    pub fn new(agent_name: impl Into<String>, url: impl Into<String>, memory: Arc<dyn Memory>) -> Self {
        Self {
            agent_name: agent_name.into(),
            url: url.into(),
            memory,
            config: TransportConfig::default(),
            session_id: None,
            client: OnceLock::new(),
        }
    }

    /// Use custom transport configuration (builder-style).
    pub fn with_config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self.client = OnceLock::new();
        self
    }

    /// Use a pre-built client instead of creating one lazily (builder-style).
    pub fn with_client(self, client: AcpClient) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(client);
        Self {
            client: cell,
            ..self
        }
    }

    /// Attach every run to `session_id` (builder-style).
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// The agent name runs are addressed to.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// The server URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The session runs are attached to, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Start a fresh session and return its id.
    pub fn new_session(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.session_id = Some(id);
        id
    }

    /// The conversation memory.
    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    /// Replace the conversation memory.
    pub fn set_memory(&mut self, memory: Arc<dyn Memory>) {
        self.memory = memory;
    }

    /// A new handle for the same agent sharing this one's memory, session and
    /// configuration.
    pub fn fork(&self) -> Self {
        Self {
            agent_name: self.agent_name.clone(),
            url: self.url.clone(),
            memory: self.memory.clone(),
            config: self.config.clone(),
            session_id: self.session_id,
            client: self.client.clone(),
        }
    }

    /// The client, created on first use.
    pub fn client(&self) -> &AcpClient {
        self.client
            .get_or_init(|| AcpClient::with_config(&self.url, self.config.clone()))
    }

    /// Run the agent on `input`.
    ///
    /// Notifications go to `observer` in wire order. On `run.completed` the
    /// input messages and then the reply are appended to memory in a single
    /// [`Memory::add_many`] call. A run that
    /// ends on an event the client does not classify succeeds with a
    /// placeholder reply and leaves memory alone.
    ///
    /// # Errors
    ///
    /// [`AcpError::Run`] when the run fails or produces no event (memory is
    /// untouched), transport errors from opening the stream, and memory
    /// errors from recording the turn.
    pub async fn run(
        &self,
        input: impl Into<RunInput>,
        observer: &mut dyn RunObserver,
    ) -> AcpResult<RemoteAgentOutput> {
        self.run_inner(input.into(), observer, None).await
    }

    /// Like [`run`](Self::run), aborting the connection when `signal` fires.
    ///
    /// After cancellation no further notifications are delivered; the run
    /// fails with "no event received" unless a terminal event already arrived.
    pub async fn run_with_signal(
        &self,
        input: impl Into<RunInput>,
        observer: &mut dyn RunObserver,
        signal: CancellationToken,
    ) -> AcpResult<RemoteAgentOutput> {
        self.run_inner(input.into(), observer, Some(signal)).await
    }

    async fn run_inner(
        &self,
        input: RunInput,
        observer: &mut dyn RunObserver,
        signal: Option<CancellationToken>,
    ) -> AcpResult<RemoteAgentOutput> {
        let wire: Vec<WireMessage> = input.items().iter().map(AgentInput::to_wire).collect();
        let request = build_run_request(&self.agent_name, wire, self.session_id);

        let stream = self.client().run_stream(request, signal.clone()).await?;
        let summary = consume_run(stream, observer).await?;

        let cancelled = signal.as_ref().is_some_and(CancellationToken::is_cancelled);
        if cancelled && !RunState::of(Some(&summary.last_event)).is_terminal() {
            debug!(agent = %self.agent_name, "run cancelled before a terminal event");
            return Err(AcpError::run(NO_EVENT_MESSAGE));
        }

        match summary.classification {
            RunClassification::Completed { text } => {
                let event = summary.last_event;
                let reply = Message::assistant(text).with_meta("event", event.raw.clone());

                let mut turn: Vec<Message> =
                    input.items().iter().map(AgentInput::to_message).collect();
                turn.push(reply.clone());
                self.memory.add_many(turn).await?;

                info!(agent = %self.agent_name, "run completed");
                Ok(RemoteAgentOutput {
                    result: reply,
                    event,
                })
            }
            RunClassification::Unrecognized { .. } => {
                debug!(agent = %self.agent_name, event_type = summary.last_event.kind(), "run ended without a reply");
                Ok(RemoteAgentOutput {
                    result: Message::assistant(NO_RESPONSE_PLACEHOLDER),
                    event: summary.last_event,
                })
            }
        }
    }

    /// Whether the server hosts an agent with this agent's name.
    ///
    /// # Errors
    ///
    /// Any failure to list agents is wrapped in
    /// [`AcpError::AgentUnreachable`]. It is not retried.
    pub async fn check_agent_exists(&self) -> AcpResult<bool> {
        let agents = self
            .client()
            .agents()
            .await
            .map_err(AcpError::agent_unreachable)?;
        let exists = agents.iter().any(|agent| agent.name == self.agent_name);
        debug!(agent = %self.agent_name, exists, "checked agent");
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::UnconstrainedMemory;
    use crate::message::Role;

    #[test]
    fn text_input_is_user_message() {
        let input = AgentInput::from("hi");
        assert_eq!(input.to_wire().role(), Some("user"));
        assert_eq!(input.to_message(), Message::user("hi"));
    }

    #[test]
    fn custom_role_input_is_masked_on_the_wire() {
        let input = AgentInput::from(Message::new("system", "be brief"));
        let wire = input.to_wire();
        assert_eq!(wire.role(), Some("user"));
        assert_eq!(wire.text(), "#custom_role#system#be brief");
        assert_eq!(input.to_message().role, Role::Custom("system".into()));
    }

    #[test]
    fn run_input_conversions() {
        assert_eq!(RunInput::from("a").items().len(), 1);
        assert_eq!(RunInput::from(vec!["a", "b"]).items().len(), 2);
        assert_eq!(
            RunInput::from(vec![Message::user("a"), Message::assistant("b")]).items().len(),
            2
        );
    }

    #[test]
    fn fork_shares_memory_and_session() {
        let memory: Arc<dyn Memory> = Arc::new(UnconstrainedMemory::new());
        let mut agent = RemoteAgent::new("echo", "http://localhost:1", memory.clone());
        let session = agent.new_session();

        let fork = agent.fork();
        assert_eq!(fork.agent_name(), "echo");
        assert_eq!(fork.session_id(), Some(session));
        assert!(Arc::ptr_eq(fork.memory(), &memory));
    }
}
