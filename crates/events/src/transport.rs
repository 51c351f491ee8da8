//! Message transport abstraction and the in-memory broadcast implementation

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::error::{EventError, Result};

/// Capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1000;

/// Capacity of each subscriber's delivery queue
const SUBSCRIBER_QUEUE: usize = 256;

/// A raw payload received on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub channel: String,
    pub payload: String,
}

/// Publish/subscribe plumbing the event bus sits on.
///
/// Implementations decide the delivery guarantee; the bus is at-least-once
/// only when the transport is.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the name of the transport backend
    fn name(&self) -> &'static str;

    /// Hand a serialized payload to `channel`
    async fn publish(&self, channel: &str, payload: String) -> Result<()>;

    /// Start listening on every channel matching `pattern`.
    ///
    /// A pattern ending in `*` matches any channel with that prefix.
    /// The receiver closes when the transport shuts down.
    async fn subscribe(&self, pattern: &str) -> Result<mpsc::Receiver<TransportMessage>>;
}

/// Check a channel name against a subscription pattern
pub fn channel_matches(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => pattern == channel,
    }
}

/// Single-process transport backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct InMemoryTransport {
    sender: broadcast::Sender<TransportMessage>,
    /// Number of payloads published (for monitoring)
    message_count: Arc<AtomicUsize>,
}

impl InMemoryTransport {
    /// Create a new transport with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new transport with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            message_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of live channel listeners
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the total number of payloads published
    pub fn message_count(&self) -> usize {
        self.message_count.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("subscriber_count", &self.subscriber_count())
            .field("message_count", &self.message_count())
            .finish()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        self.message_count.fetch_add(1, Ordering::Relaxed);
        // No listeners means nobody is subscribed to anything yet; the
        // payload is dropped exactly like a pub/sub broker would.
        let _ = self.sender.send(TransportMessage {
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<mpsc::Receiver<TransportMessage>> {
        if pattern.is_empty() {
            return Err(EventError::transport(pattern, "empty channel pattern"));
        }

        // Receiver is registered before returning so nothing published
        // after this call is missed.
        let mut rx = self.sender.subscribe();
        let (tx, out) = mpsc::channel(SUBSCRIBER_QUEUE);
        let pattern = pattern.to_string();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if !channel_matches(&pattern, &msg.channel) {
                            continue;
                        }
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(pattern = %pattern, skipped, "Channel listener lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_matches() {
        assert!(channel_matches("events.PLAN_GENERATED", "events.PLAN_GENERATED"));
        assert!(!channel_matches("events.PLAN_GENERATED", "events.SAGA_FAILED"));
        assert!(channel_matches("events.SAGA_*", "events.SAGA_FAILED"));
        assert!(channel_matches("events.*", "events.PLAN_GENERATED"));
        assert!(!channel_matches("events.*", "dead_letter"));
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let transport = InMemoryTransport::new();
        let mut rx = transport.subscribe("events.A").await.unwrap();

        transport
            .publish("events.A", "payload".to_string())
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.channel, "events.A");
        assert_eq!(received.payload, "payload");
    }

    #[tokio::test]
    async fn test_pattern_filtering() {
        let transport = InMemoryTransport::new();
        let mut rx = transport.subscribe("events.SAGA_*").await.unwrap();

        transport.publish("events.PLAN_GENERATED", "1".to_string()).await.unwrap();
        transport.publish("events.SAGA_FAILED", "2".to_string()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.payload, "2");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let transport = InMemoryTransport::new();
        let mut rx1 = transport.subscribe("c").await.unwrap();
        let mut rx2 = transport.subscribe("c").await.unwrap();

        transport.publish("c", "x".to_string()).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().payload, "x");
        assert_eq!(rx2.recv().await.unwrap().payload, "x");
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let transport = InMemoryTransport::new();

        // No subscribers, payload is dropped without error
        transport.publish("c", "x".to_string()).await.unwrap();
        assert_eq!(transport.message_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_pattern_rejected() {
        let transport = InMemoryTransport::new();
        assert!(transport.subscribe("").await.is_err());
    }

    #[test]
    fn test_clone_shares_channel() {
        let t1 = InMemoryTransport::new();
        let t2 = t1.clone();

        let _rx = t2.sender.subscribe();
        assert_eq!(t1.subscriber_count(), 1);
    }
}
