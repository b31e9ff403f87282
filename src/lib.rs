//! # acp-rs: streaming client runtime for the Agent Communication Protocol
//!
//! This crate drives remote agents over ACP: a run-based HTTP contract in
//! which `POST /runs` answers with an event stream of JSON frames describing
//! the run's progress and result, and `GET /agents` lists what a server hosts.
//!
//! ## Overview
//!
//! - **Transport** ([`client::HttpTransport`]): named endpoints, single-shot
//!   fetch and cancellable event streaming over `reqwest`
//! - **Run reducer** ([`run::consume_run`]): keeps the latest event, raises
//!   notifications, and classifies the run as completed, failed or empty
//! - **Message adapter** ([`adapter`]): converts between domain messages
//!   (role + content) and wire messages (ordered parts), masking roles the
//!   wire does not know
//! - **Agent façade** ([`agent::RemoteAgent`]): one call per turn, with an
//!   observer hook and conversation memory
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use acp_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let memory = Arc::new(UnconstrainedMemory::new());
//!     let agent = RemoteAgent::new("chat", "http://127.0.0.1:8333/api/v1/acp", memory.clone());
//!
//!     if !agent.check_agent_exists().await? {
//!         return Err("agent not found".into());
//!     }
//!
//!     let output = agent
//!         .run("Write a haiku about Rust", &mut |n: RunNotification| {
//!             if let RunNotification::Update { key, .. } = n {
//!                 println!("event: {key}");
//!             }
//!         })
//!         .await?;
//!
//!     println!("{}", output.result.text());
//!     assert_eq!(memory.len().await, 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Everything returns [`AcpResult`]. Run failures ([`AcpError::Run`]) carry a
//! message meant for users as-is; frames that fail to parse never fail a run
//! and are reported through the observer instead.

pub mod adapter;
pub mod agent;
pub mod builders;
pub mod client;
pub mod error;
pub mod memory;
pub mod message;
pub mod run;
pub mod tools;
pub mod types;
pub mod utils;

/// Prelude module that re-exports commonly used types and traits.
///
/// Import this module with `use acp_rs::prelude::*;` to get access to the most
/// frequently used types without having to import them individually.
pub mod prelude {
    pub use crate::agent::{AgentInput, RemoteAgent, RemoteAgentOutput, RunInput};
    pub use crate::builders::{ClientBuilder, RemoteAgentBuilder};
    pub use crate::client::AcpClient;
    pub use crate::error::{AcpError, AcpResult};
    pub use crate::memory::{Memory, UnconstrainedMemory};
    pub use crate::message::{Content, ContentPart, Message, Role};
    pub use crate::run::{NoopObserver, RunNotification, RunObserver};
}

// Re-export the entry points at crate root for convenience.
pub use agent::RemoteAgent;
pub use builders::{ClientBuilder, RemoteAgentBuilder};
pub use error::{AcpError, AcpResult};
