//! EventPulse broker bridge.
//!
//! Domain events travel between replicas as JSON [`Envelope`]s published on
//! per-event topics (`events:<event_id>`). Every replica pattern-subscribes
//! to [`PATTERN`] and fans incoming messages out to its local sockets.
//!
//! - [`Broker`]: publish + pattern subscribe, object-safe so the backend can
//!   be chosen at startup.
//! - [`RedisBroker`]: Redis pub/sub, shared across replicas.
//! - [`InMemoryBroker`]: `tokio::sync::broadcast` backed, for a single
//!   replica and for tests.

pub mod broker;
pub mod envelope;
pub mod memory;
pub mod redis_broker;

pub use broker::{
    publish_envelope, topic, topic_matches, Broker, BrokerError, BrokerMessage, BrokerStream,
    PATTERN,
};
pub use envelope::{Envelope, EnvelopeHeader, EventKind};
pub use memory::InMemoryBroker;
pub use redis_broker::RedisBroker;
