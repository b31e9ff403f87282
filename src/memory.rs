//! Conversation memory.
//!
//! The [`Memory`] trait is the append-only sink a
//! [`RemoteAgent`](crate::agent::RemoteAgent) writes finished turns into. The
//! protocol layer never reads or clears it. [`UnconstrainedMemory`] keeps
//! every message in insertion order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AcpResult;
use crate::message::Message;

/// Append-only conversation log.
///
/// Implementations must preserve insertion order and be `Send + Sync`.
/// Concurrent runs sharing one memory may interleave their turns; callers
/// that care must serialize those runs.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Append one message.
    async fn add(&self, message: Message) -> AcpResult<()>;

    /// Append several messages, in order.
    ///
    /// The default implementation appends them one by one.
    async fn add_many(&self, messages: Vec<Message>) -> AcpResult<()> {
        for message in messages {
            self.add(message).await?;
        }
        Ok(())
    }
}

/// In-memory log with no size limit.
#[derive(Debug, Default, Clone)]
pub struct UnconstrainedMemory {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl UnconstrainedMemory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored message, oldest first.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Number of stored messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Whether nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    /// Drop every stored message.
    pub async fn reset(&self) {
        self.messages.write().await.clear();
    }
}

#[async_trait]
impl Memory for UnconstrainedMemory {
    async fn add(&self, message: Message) -> AcpResult<()> {
        let mut messages = self.messages.write().await;
        messages.push(message);
        debug!(total = messages.len(), "message stored");
        Ok(())
    }

    async fn add_many(&self, batch: Vec<Message>) -> AcpResult<()> {
        let mut messages = self.messages.write().await;
        let added = batch.len();
        messages.extend(batch);
        debug!(added, total = messages.len(), "messages stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[tokio::test]
    async fn preserves_insertion_order() {
        let memory = UnconstrainedMemory::new();
        memory.add(Message::user("one")).await.unwrap();
        memory
            .add_many(vec![Message::assistant("two"), Message::new("system", "three")])
            .await
            .unwrap();

        let texts: Vec<String> = memory.messages().await.iter().map(Message::text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(memory.messages().await[2].role, Role::Custom("system".into()));
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let memory = UnconstrainedMemory::new();
        let shared = memory.clone();
        shared.add(Message::user("hi")).await.unwrap();
        assert_eq!(memory.len().await, 1);

        memory.reset().await;
        assert!(shared.is_empty().await);
    }

    struct CountingMemory(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl Memory for CountingMemory {
        async fn add(&self, _message: Message) -> AcpResult<()> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_add_many_delegates_to_add() {
        let memory = CountingMemory(Default::default());
        memory
            .add_many(vec![Message::user("a"), Message::user("b")])
            .await
            .unwrap();
        assert_eq!(memory.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
