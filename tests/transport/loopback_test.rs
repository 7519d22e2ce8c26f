// Loopback Transport Tests

use async_trait::async_trait;
use relaymesh::model::Command;
use relaymesh::storage::{MemoryStore, StoreError};
use relaymesh::sync::{GossipEngine, GossipError, GossipPayload, PeerSelector, VersionVector};
use relaymesh::transport::{
    ExchangeHandler, GossipTransport, LoopbackTransport, PeerAddress, TransportError,
};
use std::sync::Arc;

fn node(network: &LoopbackTransport, name: &str) -> Arc<GossipEngine<MemoryStore>> {
    Arc::new(GossipEngine::new(
        name,
        Arc::new(MemoryStore::new()),
        PeerSelector::default(),
        Arc::new(network.clone()),
    ))
}

/// A handler that always fails
struct Broken;

#[async_trait]
impl ExchangeHandler for Broken {
    fn node_name(&self) -> &str {
        "broken"
    }

    fn version_vector(&self) -> VersionVector {
        VersionVector::default()
    }

    async fn handle_exchange(&self, _remote: GossipPayload) -> Result<GossipPayload, GossipError> {
        Err(GossipError::Store(StoreError::DatabaseError("disk on fire".to_string())))
    }
}

#[tokio::test]
async fn test_delivers_to_registered_handler() {
    let network = LoopbackTransport::new();
    let b = node(&network, "node-b");
    let b_addr = PeerAddress::new("b", 1);
    network.register(b_addr.clone(), &b);

    let mut command = Command::new("esp32_1", "on");
    command.id = 3;
    let request =
        GossipPayload::new("client", VersionVector::default(), vec![command], vec![], vec![]);

    let reply = network.exchange(&b_addr, &request).await.unwrap();

    assert_eq!(reply.sender_name(), "node-b");
    assert_eq!(reply.commands.len(), 1);
    assert_eq!(b.store().count::<Command>(), 1);
    assert_eq!(network.exchange_count(), 1);
}

#[tokio::test]
async fn test_unregistered_address_is_unreachable() {
    let network = LoopbackTransport::new();

    let result = network
        .exchange(&PeerAddress::new("nowhere", 1), &GossipPayload::empty("client"))
        .await;

    assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    assert_eq!(network.exchange_count(), 0);
}

#[tokio::test]
async fn test_dropped_node_is_unreachable() {
    let network = LoopbackTransport::new();
    let address = PeerAddress::new("b", 1);
    {
        let b = node(&network, "node-b");
        network.register(address.clone(), &b);
    }

    let result = network.exchange(&address, &GossipPayload::empty("client")).await;

    assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
}

#[tokio::test]
async fn test_partition_and_heal() {
    let network = LoopbackTransport::new();
    let b = node(&network, "node-b");
    let address = PeerAddress::new("b", 1);
    network.register(address.clone(), &b);

    network.partition(&address);
    assert!(network
        .exchange(&address, &GossipPayload::empty("client"))
        .await
        .is_err());

    network.heal(&address);
    assert!(network
        .exchange(&address, &GossipPayload::empty("client"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_handler_error_maps_to_server_error() {
    let network = LoopbackTransport::new();
    let broken = Arc::new(Broken);
    let address = PeerAddress::new("broken", 1);
    network.register(address.clone(), &broken);

    let result = network.exchange(&address, &GossipPayload::empty("client")).await;

    assert!(matches!(result, Err(TransportError::Status(500))));
}

#[tokio::test]
async fn test_clones_share_registrations() {
    let network = LoopbackTransport::new();
    let other_view = network.clone();
    let b = node(&network, "node-b");
    let address = PeerAddress::new("b", 1);
    network.register(address.clone(), &b);

    assert!(other_view
        .exchange(&address, &GossipPayload::empty("client"))
        .await
        .is_ok());
    assert_eq!(network.exchange_count(), 1);
}
