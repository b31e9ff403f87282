//! Builder patterns for ergonomic construction of clients and agents.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::agent::RemoteAgent;
use crate::client::{
    default_acp_paths, to_header_map, AcpClient, EndpointRouter, HeaderSource, HttpTransport,
    TransportConfig,
};
use crate::error::{AcpError, AcpResult};
use crate::memory::{Memory, UnconstrainedMemory};

/// Builder for constructing an [`AcpClient`] with custom configuration.
///
/// # Example
///
/// ```
/// use acp_rs::builders::ClientBuilder;
/// use std::time::Duration;
///
/// let client = ClientBuilder::new("http://localhost:8333/api/v1/acp")
///     .with_timeout(Duration::from_secs(30))
///     .with_header("Authorization", "Bearer secret")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ClientBuilder {
    url: String,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    headers: HashMap<String, String>,
    header_source: Option<Arc<dyn HeaderSource>>,
    paths: HashMap<String, String>,
    http_client: Option<reqwest::Client>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("header_source", &self.header_source.is_some())
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Create a new client builder for the given base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
            connect_timeout: None,
            headers: HashMap::new(),
            header_source: None,
            paths: default_acp_paths(),
            http_client: None,
        }
    }

    /// Set the timeout for single-shot requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Add a static HTTP header, sent on every request (credentials
    /// included, e.g. `Authorization`).
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Compute headers on every call. They win over static headers.
    pub fn with_header_source(mut self, source: impl HeaderSource + 'static) -> Self {
        self.header_source = Some(Arc::new(source));
        self
    }

    /// Map endpoint `name` to `path` under the base URL.
    pub fn with_path(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.paths.insert(name.into(), path.into());
        self
    }

    /// Use an existing `reqwest::Client`. Its own settings replace the
    /// connect timeout configured here.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// [`AcpError::Configuration`] if the base URL does not parse or a
    /// static header is invalid.
    pub fn build(self) -> AcpResult<AcpClient> {
        reqwest::Url::parse(&self.url)
            .map_err(|e| AcpError::configuration(format!("invalid base URL '{}': {e}", self.url)))?;
        to_header_map(&self.headers)?;

        let mut router = EndpointRouter::new(&self.url, self.paths);
        if !self.headers.is_empty() || self.header_source.is_some() {
            router = router.with_headers(LayeredHeaders {
                fixed: self.headers,
                source: self.header_source,
            });
        }

        let defaults = TransportConfig::default();
        let timeout = self.timeout.unwrap_or(defaults.timeout);
        let transport = match self.http_client {
            Some(client) => HttpTransport::with_client(router, client).with_timeout(timeout),
            None => HttpTransport::with_config(
                router,
                TransportConfig {
                    timeout,
                    connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
                    headers: HashMap::new(),
                },
            ),
        };

        Ok(AcpClient::with_transport(Arc::new(transport)))
    }
}

/// Static headers overlaid by an optional per-call source.
struct LayeredHeaders {
    fixed: HashMap<String, String>,
    source: Option<Arc<dyn HeaderSource>>,
}

#[async_trait]
impl HeaderSource for LayeredHeaders {
    async fn headers(&self) -> AcpResult<HashMap<String, String>> {
        let mut headers = self.fixed.clone();
        if let Some(source) = &self.source {
            headers.extend(source.headers().await?);
        }
        Ok(headers)
    }
}

/// Builder for [`RemoteAgent`].
///
/// # Example
///
/// ```
/// use acp_rs::builders::RemoteAgentBuilder;
///
/// let agent = RemoteAgentBuilder::new("chat")
///     .with_url("http://localhost:8333/api/v1/acp")
///     .with_new_session()
///     .build()
///     .unwrap();
/// assert!(agent.session_id().is_some());
/// ```
pub struct RemoteAgentBuilder {
    agent_name: String,
    url: Option<String>,
    memory: Option<Arc<dyn Memory>>,
    client: Option<AcpClient>,
    config: Option<TransportConfig>,
    session_id: Option<Uuid>,
}

impl RemoteAgentBuilder {
    /// Start building an agent named `agent_name`.
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            url: None,
            memory: None,
            client: None,
            config: None,
            session_id: None,
        }
    }

    /// Set the server URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the conversation memory. Defaults to [`UnconstrainedMemory`].
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Use a pre-built client, e.g. from [`ClientBuilder`].
    pub fn with_client(mut self, client: AcpClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Transport configuration for the lazily created client.
    pub fn with_config(mut self, config: TransportConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Attach runs to an existing session.
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Attach runs to a fresh session.
    pub fn with_new_session(self) -> Self {
        self.with_session_id(Uuid::new_v4())
    }

    /// Build the agent.
    ///
    /// # Errors
    ///
    /// [`AcpError::Configuration`] if the agent name is empty, or if no URL
    /// was given and no client either.
    pub fn build(self) -> AcpResult<RemoteAgent> {
        if self.agent_name.trim().is_empty() {
            return Err(AcpError::configuration("agent name must not be empty"));
        }
        let url = match (self.url, &self.client) {
            (Some(url), _) => url,
            (None, Some(_)) => String::new(),
            (None, None) => return Err(AcpError::configuration("a URL or a client is required")),
        };

        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(UnconstrainedMemory::new()));
        let mut agent = RemoteAgent::new(self.agent_name, url, memory);
        if let Some(config) = self.config {
            agent = agent.with_config(config);
        }
        if let Some(client) = self.client {
            agent = agent.with_client(client);
        }
        if let Some(session_id) = self.session_id {
            agent = agent.with_session_id(session_id);
        }
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builder_basic() {
        let builder = ClientBuilder::new("http://localhost:8080")
            .with_timeout(Duration::from_secs(30))
            .with_header("Authorization", "Bearer test-token");

        assert_eq!(builder.url, "http://localhost:8080");
        assert_eq!(builder.timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            builder.headers.get("Authorization"),
            Some(&"Bearer test-token".to_string())
        );
        assert!(builder.build().is_ok());
    }

    #[test]
    fn client_builder_path_override() {
        let builder = ClientBuilder::new("http://localhost:8080").with_path("runs", "/v2/runs");
        assert_eq!(builder.paths.get("runs").map(String::as_str), Some("/v2/runs"));
        assert_eq!(builder.paths.get("agents").map(String::as_str), Some("/agents"));
    }

    #[test]
    fn client_builder_rejects_bad_url() {
        let err = ClientBuilder::new("not a url").build().unwrap_err();
        assert!(matches!(err, AcpError::Configuration(_)));
    }

    #[test]
    fn client_builder_rejects_bad_header() {
        let err = ClientBuilder::new("http://localhost:8080")
            .with_header("bad header", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, AcpError::Configuration(_)));
    }

    #[tokio::test]
    async fn source_headers_win_over_static_ones() {
        let layered = LayeredHeaders {
            fixed: HashMap::from([
                ("x-a".to_string(), "static".to_string()),
                ("x-b".to_string(), "static".to_string()),
            ]),
            source: Some(Arc::new(HashMap::from([(
                "x-b".to_string(),
                "dynamic".to_string(),
            )]))),
        };
        let headers = layered.headers().await.unwrap();
        assert_eq!(headers["x-a"], "static");
        assert_eq!(headers["x-b"], "dynamic");
    }

    #[test]
    fn remote_agent_builder_requires_url_or_client() {
        assert!(RemoteAgentBuilder::new("chat").build().is_err());
        assert!(RemoteAgentBuilder::new("").with_url("http://x").build().is_err());

        let client = AcpClient::from_url("http://localhost:8080");
        let agent = RemoteAgentBuilder::new("chat").with_client(client).build().unwrap();
        assert_eq!(agent.agent_name(), "chat");
        assert!(agent.session_id().is_none());
    }

    #[test]
    fn remote_agent_builder_session() {
        let id = Uuid::new_v4();
        let agent = RemoteAgentBuilder::new("chat")
            .with_url("http://localhost:8080")
            .with_session_id(id)
            .build()
            .unwrap();
        assert_eq!(agent.session_id(), Some(id));
    }
}
