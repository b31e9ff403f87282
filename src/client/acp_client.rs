//! High-level ACP client for interacting with an agent server.
//!
//! Typed methods over the two protocol endpoints: `runs` (create a run in
//! stream or sync mode) and `agents` (discovery).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AcpError, AcpResult};
use crate::types::{AgentManifest, AgentsListResponse, Message, Run, RunCreateRequest, RunMode};
use crate::utils::constants::{AGENTS_ENDPOINT, RUNS_ENDPOINT};
use crate::utils::message::user_text_message;

use super::router::EndpointRouter;
use super::sse::EventStream;
use super::transport::{HttpTransport, RequestOptions, Transport, TransportConfig};

/// Client for an ACP server.
///
/// Cheap to clone; clones share the transport.
///
/// ```no_run
/// use acp_rs::client::AcpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = AcpClient::from_url("http://localhost:8333/api/v1/acp");
///
/// for agent in client.agents().await? {
///     println!("{}", agent.name);
/// }
///
/// let mut stream = client.run_text_stream("echo", "Hello!").await?;
/// while let Some(frame) = stream.next().await {
///     println!("{}", frame?.data);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AcpClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for AcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcpClient").finish_non_exhaustive()
    }
}

impl AcpClient {
    /// Create a client for the server at `url` with the standard endpoints
    /// and default transport configuration.
    pub fn from_url(url: &str) -> Self {
        Self::with_config(url, TransportConfig::default())
    }

    /// Create a client for the server at `url` with custom configuration.
    pub fn with_config(url: &str, config: TransportConfig) -> Self {
        let transport = HttpTransport::with_config(EndpointRouter::acp(url), config);
        Self::with_transport(Arc::new(transport))
    }

    /// Create a client with a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// List the agents hosted by the server (`GET agents`).
    pub async fn agents(&self) -> AcpResult<Vec<AgentManifest>> {
        let payload = self
            .transport
            .fetch(AGENTS_ENDPOINT, RequestOptions::get())
            .await?;
        let list: AgentsListResponse = serde_json::from_value(payload)
            .map_err(|e| AcpError::InvalidJson(format!("failed to decode agent list: {e}")))?;
        Ok(list.agents)
    }

    /// Start a run and stream its events (`POST runs`, `mode: "stream"`).
    ///
    /// The request's mode is forced to [`RunMode::Stream`].
    pub async fn run_stream(
        &self,
        mut request: RunCreateRequest,
        signal: Option<CancellationToken>,
    ) -> AcpResult<EventStream> {
        request.mode = RunMode::Stream;
        let mut options = RequestOptions::post_json(&request)?;
        if let Some(signal) = signal {
            options = options.with_signal(signal);
        }
        tracing::debug!(agent = %request.agent_name, inputs = request.input.len(), "starting streamed run");
        self.transport.stream(RUNS_ENDPOINT, options).await
    }

    /// Run to completion and return the final run (`POST runs`,
    /// `mode: "sync"`).
    pub async fn run_sync(&self, mut request: RunCreateRequest) -> AcpResult<Run> {
        request.mode = RunMode::Sync;
        let options = RequestOptions::post_json(&request)?;
        tracing::debug!(agent = %request.agent_name, inputs = request.input.len(), "starting sync run");
        let payload = self.transport.fetch(RUNS_ENDPOINT, options).await?;
        serde_json::from_value(payload)
            .map_err(|e| AcpError::InvalidJson(format!("failed to decode run: {e}")))
    }

    /// Convenience: stream a run for a single user text message.
    pub async fn run_text_stream(&self, agent_name: &str, text: &str) -> AcpResult<EventStream> {
        let request = build_run_request(agent_name, vec![user_text_message(text)], None);
        self.run_stream(request, None).await
    }

    /// Close the client and release any held resources.
    pub async fn close(self) -> AcpResult<()> {
        self.transport.close().await
    }
}

/// Build a run request for `agent_name`.
pub fn build_run_request(
    agent_name: &str,
    input: Vec<Message>,
    session_id: Option<Uuid>,
) -> RunCreateRequest {
    RunCreateRequest {
        agent_name: agent_name.to_string(),
        session_id,
        input,
        mode: RunMode::Stream,
    }
}
