//! Broker abstraction: topics, messages, and the [`Broker`] trait.

use std::pin::Pin;

use async_trait::async_trait;
use eventpulse_core::types::DbId;
use futures::Stream;

use crate::envelope::Envelope;

/// Topic prefix for per-event channels.
pub const TOPIC_PREFIX: &str = "events:";

/// Pattern every replica subscribes to.
pub const PATTERN: &str = "events:*";

/// The topic carrying an event's domain events.
pub fn topic(event_id: DbId) -> String {
    format!("{TOPIC_PREFIX}{event_id}")
}

/// Glob match limited to what the broker patterns use: an exact name or a
/// single trailing `*`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}

/// A message received from a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: String,
}

/// Stream of messages from a pattern subscription. Ends when the
/// subscription is lost.
pub type BrokerStream = Pin<Box<dyn Stream<Item = BrokerMessage> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connection(#[source] redis::RedisError),

    #[error("broker publish failed: {0}")]
    Publish(#[source] redis::RedisError),

    #[error("envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pub/sub with pattern subscription.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish `payload` on `topic`. Succeeds even when nobody listens.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError>;

    /// Subscribe to every topic matching `pattern`.
    async fn psubscribe(&self, pattern: &str) -> Result<BrokerStream, BrokerError>;
}

/// Serialize an envelope once and publish it on its event's topic.
pub async fn publish_envelope(broker: &dyn Broker, envelope: &Envelope) -> Result<(), BrokerError> {
    let payload = envelope.to_json()?;
    broker.publish(&topic(envelope.evento_id), &payload).await
}
