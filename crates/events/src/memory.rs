//! In-process broker backed by a `tokio::sync::broadcast` channel.
//!
//! Clones share the same channel, so several hubs in one process behave
//! like replicas on a shared broker.

use async_trait::async_trait;
use futures::stream;
use tokio::sync::broadcast;

use crate::broker::{topic_matches, Broker, BrokerError, BrokerMessage, BrokerStream};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct InMemoryBroker {
    sender: broadcast::Sender<BrokerMessage>,
}

impl InMemoryBroker {
    /// Create a broker with a specific channel capacity.
    ///
    /// Subscribers that fall more than `capacity` messages behind skip the
    /// oldest ones and log a warning.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        // A send error only means there are zero subscribers.
        let _ = self.sender.send(BrokerMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<BrokerStream, BrokerError> {
        let rx = self.sender.subscribe();
        let pattern = pattern.to_string();

        let messages = stream::unfold((rx, pattern), |(mut rx, pattern)| async move {
            loop {
                match rx.recv().await {
                    Ok(msg) if topic_matches(&pattern, &msg.topic) => {
                        return Some((msg, (rx, pattern)));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "In-memory subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(messages))
    }
}
