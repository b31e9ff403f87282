//! ACP client: talk to a remote agent server.
//!
//! - [`AcpClient`]: typed methods for the `runs` and `agents` endpoints
//! - [`EndpointRouter`]: endpoint name → URL mapping plus per-call headers
//! - [`Transport`] / [`HttpTransport`]: single-shot fetch and event streaming
//! - [`EventStream`] / [`FrameDecoder`]: event-stream framing with cancellation
//!
//! # Quick Start
//!
//! ```no_run
//! use acp_rs::client::AcpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AcpClient::from_url("http://localhost:8333");
//!
//! let mut stream = client.run_text_stream("echo", "Hello, agent!").await?;
//! while let Some(frame) = stream.next().await {
//!     println!("{:?}", frame?);
//! }
//! # Ok(())
//! # }
//! ```

mod acp_client;
mod router;
mod sse;
mod transport;

pub use acp_client::{build_run_request, AcpClient};
pub use router::{default_acp_paths, AsyncHeaderFn, EndpointRouter, HeaderSource, SyncHeaderFn};
pub use sse::{EventStream, FrameDecoder, SseFrame};
pub use transport::{HttpTransport, RequestOptions, Transport, TransportConfig};

pub(crate) use transport::to_header_map;
