//! Vector database tool.
//!
//! The database itself is an opaque service reached through [`VectorStore`];
//! [`VectorStoreTool`] checks that each action carries the arguments it needs
//! and then delegates.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{AcpError, AcpResult};

/// A vector database. Payloads are passed through untouched.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// List every collection.
    async fn list_collections(&self) -> AcpResult<Value>;

    /// Describe one collection.
    async fn get_collection(&self, name: &str) -> AcpResult<Value>;

    /// Insert or replace points. `request` is `{ "points": [...] }`.
    async fn upsert(&self, name: &str, request: Value) -> AcpResult<Value>;

    /// Nearest-neighbour query. `request` is
    /// `{ "query", "limit", "with_payload", "filter" }`.
    async fn query(&self, name: &str, request: Value) -> AcpResult<Value>;

    /// Delete points. `request` is `{ "points": [...] }`.
    async fn delete(&self, name: &str, request: Value) -> AcpResult<Value>;
}

/// What the tool should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorAction {
    /// List collections.
    List,
    /// Describe a collection.
    Info,
    /// Search by vector.
    Search,
    /// Insert vectors.
    Insert,
    /// Delete points by id.
    Delete,
}

impl fmt::Display for VectorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VectorAction::List => "list",
            VectorAction::Info => "info",
            VectorAction::Search => "search",
            VectorAction::Insert => "insert",
            VectorAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Arguments of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorToolInput {
    /// Action to perform.
    pub action: VectorAction,
    /// Target collection; required for everything but `list`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    /// Query vector for `search`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Vectors to store for `insert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<Vec<Vec<f32>>>,
    /// Result limit for `search`.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Store-specific filter for `search`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// Whether `search` returns payloads.
    #[serde(default = "default_with_payload")]
    pub with_payload: bool,
    /// Point ids for `delete`, or explicit ids for `insert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<Value>>,
}

fn default_limit() -> usize {
    10
}

fn default_with_payload() -> bool {
    true
}

impl VectorToolInput {
    /// Input for `action` with every optional argument unset.
    pub fn new(action: VectorAction) -> Self {
        Self {
            action,
            collection_name: None,
            vector: None,
            vectors: None,
            limit: default_limit(),
            filter: None,
            with_payload: default_with_payload(),
            ids: None,
        }
    }

    /// Set the collection (builder-style).
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    /// Set the query vector (builder-style).
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Set the vectors to insert (builder-style).
    pub fn with_vectors(mut self, vectors: Vec<Vec<f32>>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    /// Set point ids (builder-style).
    pub fn with_ids(mut self, ids: Vec<Value>) -> Self {
        self.ids = Some(ids);
        self
    }
}

/// Tool wrapping a [`VectorStore`].
#[derive(Clone)]
pub struct VectorStoreTool {
    store: Arc<dyn VectorStore>,
}

impl fmt::Debug for VectorStoreTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStoreTool").finish_non_exhaustive()
    }
}

impl VectorStoreTool {
    /// Tool name as exposed to agents.
    pub const NAME: &'static str = "vector_store";

    /// Wrap `store`.
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Run the tool on JSON arguments.
    ///
    /// # Errors
    ///
    /// [`AcpError::Tool`] if `args` does not describe a valid call.
    pub async fn run_json(&self, args: Value) -> AcpResult<Value> {
        let input: VectorToolInput = serde_json::from_value(args)
            .map_err(|e| AcpError::Tool(format!("invalid {} arguments: {e}", Self::NAME)))?;
        self.run(input).await
    }

    /// Validate `input` and delegate to the store.
    ///
    /// # Errors
    ///
    /// [`AcpError::Tool`] when a required argument is missing; errors from
    /// the store are returned unchanged.
    pub async fn run(&self, input: VectorToolInput) -> AcpResult<Value> {
        debug!(action = %input.action, collection = ?input.collection_name, "vector store call");

        if input.action == VectorAction::List {
            return self.store.list_collections().await;
        }

        let collection = match input.collection_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(AcpError::Tool(format!(
                    "collection_name is required for '{}'",
                    input.action
                )))
            }
        };

        match input.action {
            VectorAction::List => self.store.list_collections().await,
            VectorAction::Info => self.store.get_collection(collection).await,
            VectorAction::Search => {
                let vector = input
                    .vector
                    .ok_or_else(|| AcpError::Tool("vector is required for 'search'".into()))?;
                let mut request = json!({
                    "query": vector,
                    "limit": input.limit,
                    "with_payload": input.with_payload,
                });
                if let Some(filter) = input.filter {
                    request["filter"] = filter;
                }
                self.store.query(collection, request).await
            }
            VectorAction::Insert => {
                let vectors = input
                    .vectors
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| AcpError::Tool("vectors are required for 'insert'".into()))?;
                let ids = input.ids.unwrap_or_default();
                let points: Vec<Value> = vectors
                    .into_iter()
                    .enumerate()
                    .map(|(i, vector)| {
                        let id = ids.get(i).cloned().unwrap_or_else(|| json!(i));
                        json!({ "id": id, "vector": vector })
                    })
                    .collect();
                self.store.upsert(collection, json!({ "points": points })).await
            }
            VectorAction::Delete => {
                let ids = input
                    .ids
                    .filter(|ids| !ids.is_empty())
                    .ok_or_else(|| AcpError::Tool("ids are required for 'delete'".into()))?;
                self.store.delete(collection, json!({ "points": ids })).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingStore {
        fn record(&self, op: &str, request: Value) -> AcpResult<Value> {
            self.calls.lock().unwrap().push((op.to_string(), request));
            Ok(json!({"ok": true}))
        }
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn list_collections(&self) -> AcpResult<Value> {
            self.record("list", Value::Null)
        }
        async fn get_collection(&self, name: &str) -> AcpResult<Value> {
            self.record("info", json!(name))
        }
        async fn upsert(&self, _name: &str, request: Value) -> AcpResult<Value> {
            self.record("upsert", request)
        }
        async fn query(&self, _name: &str, request: Value) -> AcpResult<Value> {
            self.record("query", request)
        }
        async fn delete(&self, _name: &str, request: Value) -> AcpResult<Value> {
            self.record("delete", request)
        }
    }

    fn tool() -> (Arc<RecordingStore>, VectorStoreTool) {
        let store = Arc::new(RecordingStore::default());
        (store.clone(), VectorStoreTool::new(store))
    }

    #[tokio::test]
    async fn list_needs_no_collection() {
        let (store, tool) = tool();
        tool.run(VectorToolInput::new(VectorAction::List)).await.unwrap();
        assert_eq!(store.calls.lock().unwrap()[0].0, "list");
    }

    #[tokio::test]
    async fn other_actions_need_a_collection() {
        let (store, tool) = tool();
        for action in [VectorAction::Info, VectorAction::Search, VectorAction::Delete] {
            let err = tool.run(VectorToolInput::new(action)).await.unwrap_err();
            assert!(matches!(err, AcpError::Tool(ref m) if m.contains("collection_name")));
        }
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_needs_a_vector() {
        let (_, tool) = tool();
        let err = tool
            .run(VectorToolInput::new(VectorAction::Search).with_collection("docs"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Tool error: vector is required for 'search'");
    }

    #[tokio::test]
    async fn insert_rejects_empty_vectors() {
        let (_, tool) = tool();
        let err = tool
            .run(
                VectorToolInput::new(VectorAction::Insert)
                    .with_collection("docs")
                    .with_vectors(vec![]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AcpError::Tool(_)));
    }

    #[tokio::test]
    async fn search_builds_query_request() {
        let (store, tool) = tool();
        tool.run_json(json!({
            "action": "search",
            "collection_name": "docs",
            "vector": [0.5, 1.0],
            "limit": 3,
            "filter": {"must": []}
        }))
        .await
        .unwrap();

        let calls = store.calls.lock().unwrap();
        let (op, request) = &calls[0];
        assert_eq!(op, "query");
        assert_eq!(request["query"], json!([0.5, 1.0]));
        assert_eq!(request["limit"], 3);
        assert_eq!(request["with_payload"], true);
        assert_eq!(request["filter"], json!({"must": []}));
    }

    #[tokio::test]
    async fn insert_assigns_ids() {
        let (store, tool) = tool();
        tool.run(
            VectorToolInput::new(VectorAction::Insert)
                .with_collection("docs")
                .with_vectors(vec![vec![1.0], vec![2.0]])
                .with_ids(vec![json!("a")]),
        )
        .await
        .unwrap();

        let calls = store.calls.lock().unwrap();
        let points = calls[0].1["points"].as_array().unwrap();
        assert_eq!(points[0]["id"], "a");
        assert_eq!(points[1]["id"], 1);
    }

    #[tokio::test]
    async fn malformed_arguments_are_tool_errors() {
        let (_, tool) = tool();
        let err = tool.run_json(json!({"action": "explode"})).await.unwrap_err();
        assert!(matches!(err, AcpError::Tool(_)));
    }
}
