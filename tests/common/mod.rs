//! Shared test utilities for integration tests.
//!
//! [`start_mock_server`] runs an in-process ACP server that answers
//! `POST /runs` with a scripted event stream and `GET /agents` with a fixed
//! listing, recording every run request it receives.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// How the server answers `POST /runs`.
#[derive(Debug, Clone)]
pub enum RunScript {
    /// Send these raw event-stream chunks, then close the body.
    Frames(Vec<String>),
    /// Send these chunks, then keep the connection open forever.
    Hang(Vec<String>),
    /// Answer with this JSON body (sync-mode runs).
    Json(Value),
    /// Answer with this status and a plain-text body.
    Status(u16),
}

/// What a run request looked like when it reached the server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub body: Value,
    pub headers: HeaderMap,
}

struct ServerState {
    runs: RunScript,
    agents: (StatusCode, Value),
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A running mock server.
pub struct MockServer {
    pub base_url: String,
    state: Arc<ServerState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    /// Run requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start a mock server hosting `agent_names`, answering runs with `runs`.
pub async fn start_mock_server(runs: RunScript, agent_names: &[&str]) -> MockServer {
    let agents: Vec<Value> = agent_names
        .iter()
        .map(|name| json!({"name": name, "description": format!("{name} agent")}))
        .collect();
    start_mock_server_with_agents(runs, StatusCode::OK, json!({ "agents": agents })).await
}

/// Start a mock server with full control over the `GET /agents` answer.
pub async fn start_mock_server_with_agents(
    runs: RunScript,
    agents_status: StatusCode,
    agents_body: Value,
) -> MockServer {
    let state = Arc::new(ServerState {
        runs,
        agents: (agents_status, agents_body),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/runs", post(create_run))
        .route("/agents", get(list_agents))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Brief wait for the server to start accepting connections.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    MockServer {
        base_url,
        state,
        handle,
    }
}

async fn create_run(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state
        .requests
        .lock()
        .unwrap()
        .push(RecordedRequest { body, headers });

    match &state.runs {
        RunScript::Frames(chunks) => event_stream(Body::from(chunks.concat())),
        RunScript::Hang(chunks) => {
            let chunks = chunks.clone();
            let stream = async_stream::stream! {
                for chunk in chunks {
                    yield Ok::<_, Infallible>(chunk);
                }
                futures::future::pending::<()>().await;
            };
            event_stream(Body::from_stream(stream))
        }
        RunScript::Json(run) => Json(run.clone()).into_response(),
        RunScript::Status(code) => {
            let status = StatusCode::from_u16(*code).unwrap();
            (status, "scripted failure").into_response()
        }
    }
}

async fn list_agents(State(state): State<Arc<ServerState>>) -> Response {
    let (status, body) = &state.agents;
    (*status, Json(body.clone())).into_response()
}

fn event_stream(body: Body) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(body)
        .unwrap()
}

/// One event-stream frame carrying `data`.
pub fn frame(data: &Value) -> String {
    format!("event: message\ndata: {data}\n\n")
}

/// A `run.completed` frame whose output is a single text part.
pub fn completed(text: &str) -> String {
    frame(&json!({
        "type": "run.completed",
        "run": {
            "agent_name": "chat",
            "status": "completed",
            "output": [{"parts": [{"content_type": "text/plain", "content": text}]}]
        }
    }))
}

/// A `run.failed` frame carrying `message`.
pub fn failed(message: &str) -> String {
    frame(&json!({
        "type": "run.failed",
        "run": {"status": "failed", "error": {"code": "server_error", "message": message}}
    }))
}

/// A `run.in-progress` frame.
pub fn in_progress() -> String {
    frame(&json!({"type": "run.in-progress", "run": {"status": "in-progress"}}))
}

/// A `message.part` frame carrying a text delta.
pub fn message_part(text: &str) -> String {
    frame(&json!({"type": "message.part", "part": {"content": text}}))
}
