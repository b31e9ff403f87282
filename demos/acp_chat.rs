//! ACP Chat: talks to a remote agent from the terminal.
//!
//! Every line read from stdin becomes one run. Intermediate events are
//! printed as they stream in, followed by the agent's reply.
//!
//! ```sh
//! ACP_URL=http://127.0.0.1:8333/api/v1/acp ACP_AGENT=chat \
//!     RUST_LOG=acp_rs=debug cargo run --example acp_chat
//! ```

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use acp_rs::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let url = std::env::var("ACP_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8333/api/v1/acp".into());
    let name = std::env::var("ACP_AGENT").unwrap_or_else(|_| "chat".into());

    let memory = Arc::new(UnconstrainedMemory::new());
    let agent = RemoteAgentBuilder::new(&name)
        .with_url(&url)
        .with_memory(memory.clone())
        .with_new_session()
        .build()?;

    if !agent.check_agent_exists().await? {
        anyhow::bail!("agent '{name}' is not hosted at {url}");
    }
    println!("Connected to {name} at {url}. Empty line or Ctrl-D to quit.");

    let stdin = io::stdin();
    loop {
        print!("you> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }

        let mut observer = |notification: RunNotification| match notification {
            RunNotification::Update { key, value } => println!("  [{key}] {value}"),
            RunNotification::Error { message } => eprintln!("  [error] {message}"),
        };

        match agent.run(line.trim(), &mut observer).await {
            Ok(output) => println!("{name}> {}", output.result.text()),
            Err(err) => eprintln!("{name}> {err}"),
        }
    }

    let history = memory.messages().await;
    println!("--- {} messages in memory ---", history.len());
    for message in &history {
        println!("{}: {}", message.role, message.text());
    }

    Ok(())
}
