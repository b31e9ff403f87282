//! Endpoint routing and per-call header production.
//!
//! An [`EndpointRouter`] maps symbolic endpoint names (`"runs"`, `"agents"`)
//! to URLs under a base URL. The endpoint set is fixed at construction.
//! Headers come from an optional [`HeaderSource`] that is asked again on
//! every call, so tokens that rotate are always fresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AcpError, AcpResult};
use crate::utils::constants::{
    AGENTS_ENDPOINT, DEFAULT_AGENTS_PATH, DEFAULT_RUNS_PATH, RUNS_ENDPOINT,
};

/// Produces the default headers for a request.
///
/// Implemented for a plain `HashMap<String, String>` (static headers), and by
/// [`SyncHeaderFn`] / [`AsyncHeaderFn`] for headers computed per call.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Produce the headers for one request.
    async fn headers(&self) -> AcpResult<HashMap<String, String>>;
}

#[async_trait]
impl HeaderSource for HashMap<String, String> {
    async fn headers(&self) -> AcpResult<HashMap<String, String>> {
        Ok(self.clone())
    }
}

/// Headers computed synchronously on every call.
pub struct SyncHeaderFn<F>(pub F);

#[async_trait]
impl<F> HeaderSource for SyncHeaderFn<F>
where
    F: Fn() -> HashMap<String, String> + Send + Sync,
{
    async fn headers(&self) -> AcpResult<HashMap<String, String>> {
        Ok((self.0)())
    }
}

/// Headers computed asynchronously on every call (e.g. a token refresh).
pub struct AsyncHeaderFn<F>(pub F);

#[async_trait]
impl<F, Fut> HeaderSource for AsyncHeaderFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = AcpResult<HashMap<String, String>>> + Send,
{
    async fn headers(&self) -> AcpResult<HashMap<String, String>> {
        (self.0)().await
    }
}

/// Maps endpoint names to URLs and produces request headers.
///
/// # Example
///
/// ```
/// use acp_rs::client::EndpointRouter;
///
/// let router = EndpointRouter::acp("http://localhost:8333/api/v1/acp/");
/// assert_eq!(router.resolve("runs").unwrap(), "http://localhost:8333/api/v1/acp/runs");
/// assert!(router.resolve("bogus").is_err());
/// ```
#[derive(Clone)]
pub struct EndpointRouter {
    base_url: String,
    paths: Arc<HashMap<String, String>>,
    headers: Option<Arc<dyn HeaderSource>>,
}

impl std::fmt::Debug for EndpointRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRouter")
            .field("base_url", &self.base_url)
            .field("paths", &self.paths)
            .field("headers", &self.headers.is_some())
            .finish()
    }
}

impl EndpointRouter {
    /// Create a router for `base_url` with the given name → relative path map.
    pub fn new(base_url: impl Into<String>, paths: HashMap<String, String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            paths: Arc::new(paths),
            headers: None,
        }
    }

    /// Create a router with the standard ACP endpoints (`runs`, `agents`).
    pub fn acp(base_url: impl Into<String>) -> Self {
        Self::new(base_url, default_acp_paths())
    }

    /// Attach a header source (builder-style).
    pub fn with_headers(mut self, source: impl HeaderSource + 'static) -> Self {
        self.headers = Some(Arc::new(source));
        self
    }

    /// Attach a shared header source (builder-style).
    pub fn with_shared_headers(mut self, source: Arc<dyn HeaderSource>) -> Self {
        self.headers = Some(source);
        self
    }

    /// The base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The relative path registered for `name`, if any.
    pub fn path(&self, name: &str) -> Option<&str> {
        self.paths.get(name).map(String::as_str)
    }

    /// Resolve an endpoint name to an absolute URL.
    ///
    /// # Errors
    ///
    /// [`AcpError::Configuration`] if `name` is not a registered endpoint or
    /// the joined URL does not parse.
    pub fn resolve(&self, name: &str) -> AcpResult<String> {
        let path = self.path(name).ok_or_else(|| {
            AcpError::configuration(format!("unknown endpoint '{name}'"))
        })?;

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        reqwest::Url::parse(&url)
            .map_err(|e| AcpError::configuration(format!("invalid URL for endpoint '{name}': {e}")))?;
        Ok(url)
    }

    /// Produce the headers for one call: the source's headers, overlaid with
    /// `overrides` (caller values win).
    pub async fn headers(
        &self,
        overrides: &HashMap<String, String>,
    ) -> AcpResult<HashMap<String, String>> {
        let mut headers = match &self.headers {
            Some(source) => source.headers().await?,
            None => HashMap::new(),
        };
        headers.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(headers)
    }
}

/// The standard ACP endpoint map.
pub fn default_acp_paths() -> HashMap<String, String> {
    HashMap::from([
        (RUNS_ENDPOINT.to_string(), DEFAULT_RUNS_PATH.to_string()),
        (AGENTS_ENDPOINT.to_string(), DEFAULT_AGENTS_PATH.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn resolves_known_endpoints() {
        let router = EndpointRouter::acp("http://localhost:8000");
        assert_eq!(router.resolve("runs").unwrap(), "http://localhost:8000/runs");
        assert_eq!(router.resolve("agents").unwrap(), "http://localhost:8000/agents");
    }

    #[test]
    fn unknown_endpoint_is_configuration_error() {
        let router = EndpointRouter::acp("http://localhost:8000");
        assert!(matches!(
            router.resolve("sessions"),
            Err(AcpError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_base_url_is_configuration_error() {
        let router = EndpointRouter::acp("not a url");
        assert!(matches!(router.resolve("runs"), Err(AcpError::Configuration(_))));
    }

    #[tokio::test]
    async fn caller_headers_win() {
        let router = EndpointRouter::acp("http://x").with_headers(HashMap::from([
            ("x-a".to_string(), "source".to_string()),
            ("x-b".to_string(), "source".to_string()),
        ]));
        let headers = router
            .headers(&HashMap::from([("x-b".to_string(), "caller".to_string())]))
            .await
            .unwrap();
        assert_eq!(headers["x-a"], "source");
        assert_eq!(headers["x-b"], "caller");
    }

    #[tokio::test]
    async fn header_fn_runs_on_every_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = EndpointRouter::acp("http://x").with_headers(SyncHeaderFn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            HashMap::from([("x-call".to_string(), n.to_string())])
        }));

        let first = router.headers(&HashMap::new()).await.unwrap();
        let second = router.headers(&HashMap::new()).await.unwrap();
        assert_eq!(first["x-call"], "1");
        assert_eq!(second["x-call"], "2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn async_header_fn_errors_propagate() {
        let router = EndpointRouter::acp("http://x").with_headers(AsyncHeaderFn(|| async {
            Err::<HashMap<String, String>, _>(AcpError::Other("token refresh failed".into()))
        }));
        assert!(router.headers(&HashMap::new()).await.is_err());
    }
}
