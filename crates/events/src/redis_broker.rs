//! Redis pub/sub broker shared by all replicas.

use async_trait::async_trait;
use futures::{future, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::broker::{Broker, BrokerError, BrokerMessage, BrokerStream};

pub struct RedisBroker {
    client: redis::Client,
    /// Publishing connection; cloned per call, multiplexed underneath.
    conn: MultiplexedConnection,
}

impl RedisBroker {
    /// Open a client and establish the publishing connection.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url).map_err(BrokerError::Connection)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(BrokerError::Connection)?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(BrokerError::Publish)?;
        tracing::trace!(topic, receivers, "Published to redis");
        Ok(())
    }

    /// Each subscription uses its own dedicated connection; the stream ends
    /// when that connection drops.
    async fn psubscribe(&self, pattern: &str) -> Result<BrokerStream, BrokerError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(BrokerError::Connection)?;
        pubsub
            .psubscribe(pattern)
            .await
            .map_err(BrokerError::Connection)?;

        let messages = pubsub.into_on_message().filter_map(|msg| {
            let topic = msg.get_channel_name().to_string();
            let converted = match String::from_utf8(msg.get_payload_bytes().to_vec()) {
                Ok(payload) => Some(BrokerMessage { topic, payload }),
                Err(_) => {
                    tracing::warn!(topic = %topic, "Dropping non-UTF-8 broker payload");
                    None
                }
            };
            future::ready(converted)
        });

        Ok(Box::pin(messages))
    }
}
