//! Transport layer for ACP client communication.
//!
//! Provides the [`Transport`] trait, which addresses endpoints by name and
//! offers two access modes (single-shot [`fetch`](Transport::fetch) and
//! continuous [`stream`](Transport::stream)), and [`HttpTransport`], the
//! `reqwest` implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AcpError, AcpResult};
use crate::utils::constants::EVENT_STREAM_CONTENT_TYPE;

use super::router::EndpointRouter;
use super::sse::EventStream;

/// Everything a single call needs besides the endpoint name.
///
/// Owned by the call that creates it.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Per-call headers; these win over the router's header source.
    pub headers: HashMap<String, String>,
    /// Serialized JSON body.
    pub body: Option<Vec<u8>>,
    /// Cancellation signal.
    pub signal: Option<CancellationToken>,
}

impl RequestOptions {
    /// A bodyless `GET`.
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            headers: HashMap::new(),
            body: None,
            signal: None,
        }
    }

    /// A `POST` carrying `body` serialized as JSON.
    pub fn post_json(body: &impl Serialize) -> AcpResult<Self> {
        let body = serde_json::to_vec(body)
            .map_err(|e| AcpError::Transport(format!("failed to serialize request body: {e}")))?;
        Ok(Self {
            method: Method::POST,
            headers: HashMap::new(),
            body: Some(body),
            signal: None,
        })
    }

    /// Add a per-call header (builder-style).
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a cancellation signal (builder-style).
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Transport abstraction for ACP communication.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request to `endpoint` and decode the complete body as JSON.
    ///
    /// # Errors
    ///
    /// [`AcpError::Configuration`] for unknown endpoints, the transport family
    /// ([`AcpError::is_transport`]) for connection failures, non-2xx statuses
    /// and undecodable bodies, [`AcpError::Cancelled`] if the signal fires.
    async fn fetch(&self, endpoint: &str, options: RequestOptions) -> AcpResult<Value>;

    /// Issue a request to `endpoint` and return its body as a frame stream.
    ///
    /// A cancelled signal ends the stream quietly; if it fires before the
    /// server answers, the returned stream is already closed.
    async fn stream(&self, endpoint: &str, options: RequestOptions) -> AcpResult<EventStream>;

    /// Close the transport and release any held resources.
    ///
    /// The default implementation is a no-op.
    async fn close(&self) -> AcpResult<()> {
        Ok(())
    }
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Total timeout for single-shot fetches. Streams are not bounded by it.
    /// Defaults to 60 seconds.
    pub timeout: Duration,
    /// Connection timeout for every request. Defaults to 10 seconds.
    pub connect_timeout: Duration,
    /// Static headers sent with every request.
    pub headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            headers: HashMap::new(),
        }
    }
}

/// HTTP transport using `reqwest`.
///
/// # Example
///
/// ```no_run
/// use acp_rs::client::{EndpointRouter, HttpTransport};
///
/// let transport = HttpTransport::new(EndpointRouter::acp("http://localhost:8333"));
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    router: EndpointRouter,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with default configuration.
    pub fn new(router: EndpointRouter) -> Self {
        Self::with_config(router, TransportConfig::default())
    }

    /// Create a transport with custom configuration.
    pub fn with_config(router: EndpointRouter, config: TransportConfig) -> Self {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(val)) => {
                    default_headers.insert(name, val);
                }
                _ => warn!(header = %key, "skipping invalid static header"),
            }
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(default_headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            router,
            timeout: config.timeout,
        }
    }

    /// Create a transport around an existing `reqwest::Client`.
    ///
    /// Useful to share a connection pool or configure TLS externally.
    pub fn with_client(router: EndpointRouter, client: reqwest::Client) -> Self {
        Self {
            client,
            router,
            timeout: TransportConfig::default().timeout,
        }
    }

    /// Override the single-shot fetch timeout (builder-style).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The router this transport resolves endpoints with.
    pub fn router(&self) -> &EndpointRouter {
        &self.router
    }

    async fn build_request(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> AcpResult<reqwest::RequestBuilder> {
        let url = self.router.resolve(endpoint)?;
        let headers = to_header_map(&self.router.headers(&options.headers).await?)?;

        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        debug!(endpoint, %url, method = %options.method, "sending request");
        Ok(request)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, endpoint: &str, options: RequestOptions) -> AcpResult<Value> {
        let request = self
            .build_request(endpoint, &options)
            .await?
            .header(ACCEPT, "application/json")
            .timeout(self.timeout);

        let signal = options.signal.unwrap_or_default();
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| AcpError::from_reqwest("HTTP request", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AcpError::Http {
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| AcpError::Transport(format!("failed to read response body: {e}")))?;

            serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                AcpError::InvalidJson(format!("failed to parse response from '{endpoint}': {e}"))
            })
        };

        tokio::select! {
            biased;
            () = signal.cancelled() => Err(AcpError::Cancelled),
            result = exchange => result,
        }
    }

    async fn stream(&self, endpoint: &str, options: RequestOptions) -> AcpResult<EventStream> {
        let request = self
            .build_request(endpoint, &options)
            .await?
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE);

        let signal = options.signal.unwrap_or_default();
        let response = tokio::select! {
            biased;
            () = signal.cancelled() => {
                debug!(endpoint, "stream cancelled before the server answered");
                return Ok(EventStream::closed(signal.clone()));
            }
            response = request.send() => response
                .map_err(|e| AcpError::from_reqwest("stream request", e))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AcpError::Http {
                status: status.as_u16(),
                body,
            });
        }

        debug!(endpoint, "event stream opened");
        Ok(EventStream::from_response(response, signal))
    }
}

pub(crate) fn to_header_map(headers: &HashMap<String, String>) -> AcpResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| AcpError::configuration(format!("invalid header name '{key}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AcpError::configuration(format!("invalid value for header '{key}': {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}
