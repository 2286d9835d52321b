//! Fan-out hub behaviour against the in-memory broker: per-event routing,
//! cross-replica delivery, slow-client eviction and shutdown.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use eventpulse_api::ws::{Hub, HubClosed, HubConfig, Registration};
use eventpulse_core::types::DbId;
use eventpulse_events::{topic, Broker, EventKind, InMemoryBroker};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Replica {
    hub: Arc<Hub>,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

fn start_hub(broker: &InMemoryBroker, config: HubConfig) -> Replica {
    let cancel = CancellationToken::new();
    let (hub, hub_loop) = Hub::new(Arc::new(broker.clone()), config);
    let handle = tokio::spawn(hub_loop.run(cancel.clone()));
    Replica {
        hub,
        cancel,
        handle,
    }
}

fn small_queue(capacity: usize) -> HubConfig {
    HubConfig {
        send_queue_capacity: capacity,
        ..HubConfig::default()
    }
}

async fn recv(registration: &mut Registration) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(2), registration.receiver.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("queue closed");
    serde_json::from_str(frame.as_str()).unwrap()
}

/// Publish a message on a separate event and wait for it, so every
/// earlier broker message has been fully fanned out.
async fn barrier(hub: &Hub, witness: &mut Registration) {
    hub.notify(EventKind::Ping, witness.event_id, &json!({ "barrier": true }))
        .await;
    let envelope = recv(witness).await;
    assert_eq!(envelope["tipo"], "ping");
}

async fn notify_seq(hub: &Hub, event_id: DbId, seq: u32) {
    hub.notify(EventKind::MensajeNuevo, event_id, &json!({ "seq": seq }))
        .await;
}

// ---------------------------------------------------------------------------
// Registration and routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registration_is_counted_per_event() {
    let broker = InMemoryBroker::default();
    let replica = start_hub(&broker, HubConfig::default());
    let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

    let a = replica.hub.register(e1, Uuid::new_v4()).await.unwrap();
    let _b = replica.hub.register(e1, Uuid::new_v4()).await.unwrap();
    let mut witness = replica.hub.register(e2, Uuid::new_v4()).await.unwrap();

    assert_eq!(replica.hub.connection_count().await, 3);
    assert_eq!(replica.hub.event_connection_count(e1).await, 2);

    replica.hub.deregister(e1, a.client_id);
    // Deregistration is queued; an acknowledged registration proves it ran.
    let _c = replica.hub.register(e2, Uuid::new_v4()).await.unwrap();
    assert_eq!(replica.hub.event_connection_count(e1).await, 1);
    assert_eq!(replica.hub.event_connection_count(e2).await, 2);

    // Deregistering an unknown client is a no-op.
    replica.hub.deregister(e1, Uuid::new_v4());
    barrier(&replica.hub, &mut witness).await;
    assert_eq!(replica.hub.event_connection_count(e1).await, 1);
}

#[tokio::test]
async fn envelopes_reach_only_their_event() {
    let broker = InMemoryBroker::default();
    let replica = start_hub(&broker, HubConfig::default());
    let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

    let mut on_e1 = replica.hub.register(e1, Uuid::new_v4()).await.unwrap();
    let mut on_e2 = replica.hub.register(e2, Uuid::new_v4()).await.unwrap();

    notify_seq(&replica.hub, e1, 1).await;
    notify_seq(&replica.hub, e2, 2).await;

    let first = recv(&mut on_e1).await;
    assert_eq!(first["evento_id"], e1.to_string());
    assert_eq!(first["payload"]["seq"], 1);

    // e2's first frame is its own message, not e1's.
    let second = recv(&mut on_e2).await;
    assert_eq!(second["payload"]["seq"], 2);
    assert!(on_e1.receiver.try_recv().is_err());
}

#[tokio::test]
async fn frames_preserve_publish_order() {
    let broker = InMemoryBroker::default();
    let replica = start_hub(&broker, HubConfig::default());
    let event = Uuid::new_v4();
    let mut client = replica.hub.register(event, Uuid::new_v4()).await.unwrap();

    for seq in 0..20 {
        notify_seq(&replica.hub, event, seq).await;
    }
    for seq in 0..20 {
        assert_eq!(recv(&mut client).await["payload"]["seq"], seq);
    }
}

#[tokio::test]
async fn events_cross_replicas() {
    let broker = InMemoryBroker::default();
    let a = start_hub(&broker, HubConfig::default());
    let b = start_hub(&broker, HubConfig::default());
    let event = Uuid::new_v4();

    let mut on_a = a.hub.register(event, Uuid::new_v4()).await.unwrap();
    let mut on_b = b.hub.register(event, Uuid::new_v4()).await.unwrap();

    notify_seq(&a.hub, event, 7).await;

    assert_eq!(recv(&mut on_a).await["payload"]["seq"], 7);
    assert_eq!(recv(&mut on_b).await["payload"]["seq"], 7);
}

#[tokio::test]
async fn malformed_broker_messages_are_dropped() {
    let broker = InMemoryBroker::default();
    let replica = start_hub(&broker, HubConfig::default());
    let event = Uuid::new_v4();
    let mut client = replica.hub.register(event, Uuid::new_v4()).await.unwrap();

    broker.publish(&topic(event), "not json").await.unwrap();
    notify_seq(&replica.hub, event, 1).await;

    assert_eq!(recv(&mut client).await["payload"]["seq"], 1);
    assert_eq!(replica.hub.event_connection_count(event).await, 1);
}

// ---------------------------------------------------------------------------
// Backpressure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exactly_full_queue_keeps_client_until_next_message() {
    let broker = InMemoryBroker::default();
    let replica = start_hub(&broker, small_queue(2));
    let event = Uuid::new_v4();
    let mut witness = replica.hub.register(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
    let mut slow = replica.hub.register(event, Uuid::new_v4()).await.unwrap();

    notify_seq(&replica.hub, event, 1).await;
    notify_seq(&replica.hub, event, 2).await;
    barrier(&replica.hub, &mut witness).await;

    // Queue holds exactly its capacity: still registered.
    assert_eq!(replica.hub.event_connection_count(event).await, 1);

    notify_seq(&replica.hub, event, 3).await;
    barrier(&replica.hub, &mut witness).await;
    assert_eq!(replica.hub.event_connection_count(event).await, 0);

    // The evicted client drains what was queued, then sees the close.
    assert_eq!(recv(&mut slow).await["payload"]["seq"], 1);
    assert_eq!(recv(&mut slow).await["payload"]["seq"], 2);
    assert_matches!(slow.receiver.recv().await, None);
}

#[tokio::test]
async fn slow_client_does_not_block_fast_clients() {
    let broker = InMemoryBroker::default();
    let replica = start_hub(&broker, small_queue(4));
    let event = Uuid::new_v4();
    let mut witness = replica.hub.register(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
    let _slow = replica.hub.register(event, Uuid::new_v4()).await.unwrap();
    let mut fast = replica.hub.register(event, Uuid::new_v4()).await.unwrap();

    for seq in 0..10 {
        notify_seq(&replica.hub, event, seq).await;
        assert_eq!(recv(&mut fast).await["payload"]["seq"], seq);
    }
    barrier(&replica.hub, &mut witness).await;

    assert_eq!(replica.hub.event_connection_count(event).await, 1);
}

#[tokio::test]
async fn dropped_receiver_is_pruned_on_next_delivery() {
    let broker = InMemoryBroker::default();
    let replica = start_hub(&broker, HubConfig::default());
    let event = Uuid::new_v4();
    let mut witness = replica.hub.register(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
    let gone = replica.hub.register(event, Uuid::new_v4()).await.unwrap();
    drop(gone);

    notify_seq(&replica.hub, event, 1).await;
    barrier(&replica.hub, &mut witness).await;
    assert_eq!(replica.hub.event_connection_count(event).await, 0);
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_closes_every_queue() {
    let broker = InMemoryBroker::default();
    let replica = start_hub(&broker, HubConfig::default());
    let mut a = replica.hub.register(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
    let mut b = replica.hub.register(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();

    replica.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), replica.handle)
        .await
        .expect("hub loop did not stop")
        .unwrap();

    assert!(a.receiver.recv().await.is_none());
    assert!(b.receiver.recv().await.is_none());
    assert_eq!(replica.hub.connection_count().await, 0);
    assert_matches!(
        replica.hub.register(Uuid::new_v4(), Uuid::new_v4()).await.err(),
        Some(HubClosed)
    );
}
