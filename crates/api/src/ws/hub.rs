//! Per-replica registry and the single control loop that owns it.
//!
//! The registry is only mutated by [`HubLoop`]. Fan-out reads it under the
//! shared lock and enqueues with `try_send`, so no socket write happens
//! while the lock is held. A socket whose queue is full is considered slow:
//! it is removed from the registry, which drops the queue sender and lets
//! its writer close the connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use eventpulse_core::types::DbId;
use eventpulse_events::{
    publish_envelope, Broker, BrokerError, BrokerMessage, BrokerStream, Envelope, EventKind,
    PATTERN,
};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

pub type ClientId = uuid::Uuid;

/// Broker messages buffered between the subscription pump and the loop.
const INBOUND_CAPACITY: usize = 1024;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Socket limits and per-socket queue sizing.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound frames buffered per socket before it is evicted as slow.
    pub send_queue_capacity: usize,
    /// Read deadline; each pong extends it by this much.
    pub pong_wait: Duration,
    /// Deadline for writing a single frame.
    pub write_wait: Duration,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
}

impl HubConfig {
    /// Pings go out at 90% of the pong wait so a healthy peer always
    /// answers before its deadline.
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: 256,
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            max_message_size: 1024,
        }
    }
}

/// The control loop is no longer running.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("hub is shut down")]
pub struct HubClosed;

/// A socket's place in the registry plus the receiving end of its queue.
///
/// The queue closes when the socket is evicted or the hub shuts down.
pub struct Registration {
    pub client_id: ClientId,
    pub event_id: DbId,
    pub user_id: DbId,
    pub receiver: mpsc::Receiver<Utf8Bytes>,
}

struct Client {
    user_id: DbId,
    sender: mpsc::Sender<Utf8Bytes>,
}

type Registry = HashMap<DbId, HashMap<ClientId, Client>>;

enum Command {
    Register {
        client_id: ClientId,
        event_id: DbId,
        client: Client,
        ack: oneshot::Sender<()>,
    },
    Deregister {
        client_id: ClientId,
        event_id: DbId,
    },
}

/// Handle to the hub, shared via `Arc<Hub>`.
pub struct Hub {
    broker: Arc<dyn Broker>,
    config: HubConfig,
    registry: RwLock<Registry>,
    commands: mpsc::UnboundedSender<Command>,
}

/// Owns the command queue; drive it with [`HubLoop::run`].
pub struct HubLoop {
    hub: Arc<Hub>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Hub {
    pub fn new(broker: Arc<dyn Broker>, config: HubConfig) -> (Arc<Hub>, HubLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Arc::new(Hub {
            broker,
            config,
            registry: RwLock::new(HashMap::new()),
            commands: tx,
        });
        let hub_loop = HubLoop {
            hub: Arc::clone(&hub),
            commands: rx,
        };
        (hub, hub_loop)
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Add a socket to an event's registry.
    ///
    /// Resolves once the control loop has applied the registration, so
    /// every broker message processed afterwards reaches the new socket.
    pub async fn register(&self, event_id: DbId, user_id: DbId) -> Result<Registration, HubClosed> {
        let client_id = uuid::Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.config.send_queue_capacity);
        let (ack, acked) = oneshot::channel();

        self.commands
            .send(Command::Register {
                client_id,
                event_id,
                client: Client { user_id, sender },
                ack,
            })
            .map_err(|_| HubClosed)?;
        acked.await.map_err(|_| HubClosed)?;

        Ok(Registration {
            client_id,
            event_id,
            user_id,
            receiver,
        })
    }

    /// Remove a socket. Unknown ids and a stopped hub are ignored.
    pub fn deregister(&self, event_id: DbId, client_id: ClientId) {
        let _ = self.commands.send(Command::Deregister { client_id, event_id });
    }

    /// Serialize an envelope and publish it on its event's topic.
    ///
    /// Delivery to local sockets happens when the message comes back
    /// through this replica's own subscription.
    pub async fn publish(&self, envelope: &Envelope) -> Result<(), BrokerError> {
        publish_envelope(self.broker.as_ref(), envelope).await
    }

    /// Publish a domain event, logging instead of failing.
    ///
    /// The durable write has already committed when handlers call this, so
    /// a broker outage only degrades realtime delivery.
    pub async fn notify<T: Serialize>(&self, kind: EventKind, event_id: DbId, payload: &T) {
        let result = match Envelope::new(kind, event_id, payload) {
            Ok(envelope) => self.publish(&envelope).await,
            Err(e) => Err(BrokerError::from(e)),
        };
        if let Err(e) = result {
            tracing::warn!(
                error = %e,
                kind = kind.as_str(),
                event_id = %event_id,
                "Failed to publish domain event"
            );
        }
    }

    /// Number of sockets registered on this replica.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.values().map(HashMap::len).sum()
    }

    /// Number of sockets registered on this replica for one event.
    pub async fn event_connection_count(&self, event_id: DbId) -> usize {
        self.registry
            .read()
            .await
            .get(&event_id)
            .map_or(0, HashMap::len)
    }

    async fn apply(&self, command: Command) {
        let mut registry = self.registry.write().await;
        match command {
            Command::Register {
                client_id,
                event_id,
                client,
                ack,
            } => {
                tracing::debug!(
                    conn_id = %client_id,
                    event_id = %event_id,
                    user_id = %client.user_id,
                    "Client registered"
                );
                registry.entry(event_id).or_default().insert(client_id, client);
                let _ = ack.send(());
            }
            Command::Deregister {
                client_id,
                event_id,
            } => {
                if let Some(clients) = registry.get_mut(&event_id) {
                    if clients.remove(&client_id).is_some() {
                        tracing::debug!(conn_id = %client_id, event_id = %event_id, "Client deregistered");
                    }
                    if clients.is_empty() {
                        registry.remove(&event_id);
                    }
                }
            }
        }
    }

    /// Deliver one broker message to every local socket of its event.
    async fn fan_out(&self, message: BrokerMessage) {
        let header = match Envelope::peek(&message.payload) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!(topic = %message.topic, error = %e, "Dropping malformed envelope");
                return;
            }
        };
        let event_id = header.evento_id;
        let frame = Utf8Bytes::from(message.payload);

        let mut slow = Vec::new();
        {
            let registry = self.registry.read().await;
            let Some(clients) = registry.get(&event_id) else {
                return;
            };
            for (client_id, client) in clients {
                match client.sender.try_send(frame.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => slow.push((*client_id, true)),
                    Err(TrySendError::Closed(_)) => slow.push((*client_id, false)),
                }
            }
        }

        if slow.is_empty() {
            return;
        }

        let mut registry = self.registry.write().await;
        if let Some(clients) = registry.get_mut(&event_id) {
            for (client_id, full) in slow {
                if let Some(client) = clients.remove(&client_id) {
                    if full {
                        tracing::warn!(
                            conn_id = %client_id,
                            event_id = %event_id,
                            user_id = %client.user_id,
                            "Evicting slow client"
                        );
                    }
                }
            }
            if clients.is_empty() {
                registry.remove(&event_id);
            }
        }
    }

    /// Drop every queue; each writer then closes its socket.
    async fn close_all(&self) {
        let mut registry = self.registry.write().await;
        let count: usize = registry.values().map(HashMap::len).sum();
        registry.clear();
        tracing::info!(count, "Closed all WebSocket queues");
    }
}

impl HubLoop {
    /// Run until `cancel` fires, then close every socket queue.
    ///
    /// The initial broker subscription is attempted before any command is
    /// processed, so a registration that has been acknowledged is never
    /// racing the subscription.
    pub async fn run(mut self, cancel: CancellationToken) {
        let hub = self.hub;
        let (inbound_tx, mut inbound) = mpsc::channel(INBOUND_CAPACITY);

        let initial = match hub.broker.psubscribe(PATTERN).await {
            Ok(stream) => {
                tracing::info!(pattern = PATTERN, "Subscribed to broker");
                Some(stream)
            }
            Err(e) => {
                tracing::error!(error = %e, "Initial broker subscription failed, retrying");
                None
            }
        };
        let pump = tokio::spawn(pump(
            Arc::clone(&hub.broker),
            initial,
            inbound_tx,
            cancel.clone(),
        ));

        tracing::info!("Hub control loop started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(command) = self.commands.recv() => hub.apply(command).await,
                Some(message) = inbound.recv() => hub.fan_out(message).await,
            }
        }

        hub.close_all().await;
        let _ = pump.await;
        tracing::info!("Hub control loop stopped");
    }
}

/// Forward broker messages to the control loop, resubscribing with capped
/// exponential backoff whenever the subscription fails or ends.
async fn pump(
    broker: Arc<dyn Broker>,
    mut current: Option<BrokerStream>,
    tx: mpsc::Sender<BrokerMessage>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        if let Some(mut stream) = current.take() {
            backoff = INITIAL_BACKOFF;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    next = stream.next() => match next {
                        Some(message) => {
                            if tx.send(message).await.is_err() {
                                return;
                            }
                        }
                        None => {
                            tracing::warn!("Broker subscription ended");
                            break;
                        }
                    },
                }
            }
        }

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);

        match broker.psubscribe(PATTERN).await {
            Ok(stream) => {
                tracing::info!(pattern = PATTERN, "Resubscribed to broker");
                current = Some(stream);
            }
            Err(e) => {
                tracing::error!(error = %e, retry_in_secs = backoff.as_secs(), "Broker subscription failed");
            }
        }
    }
}
