// Loopback Transport - in-process delivery between engines
//
// Used to simulate clusters in tests and tools. Payloads still go through
// the JSON codec in both directions so the wire format is exercised.
// Handlers are held weakly; a dropped node behaves like an unreachable one.

use crate::sync::GossipPayload;
use crate::transport::{ExchangeHandler, GossipTransport, PeerAddress, TransportError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Default)]
struct Inner {
    handlers: HashMap<PeerAddress, Weak<dyn ExchangeHandler>>,
    partitioned: HashSet<PeerAddress>,
    exchanges: u64,
}

/// Shared in-memory network. Clones see the same registrations.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    inner: Arc<RwLock<Inner>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handler` reachable at `address`
    pub fn register<H>(&self, address: PeerAddress, handler: &Arc<H>)
    where
        H: ExchangeHandler + 'static,
    {
        let handler: Arc<dyn ExchangeHandler> = handler.clone();
        self.inner
            .write()
            .handlers
            .insert(address, Arc::downgrade(&handler));
    }

    /// Make `address` unreachable until healed
    pub fn partition(&self, address: &PeerAddress) {
        self.inner.write().partitioned.insert(address.clone());
    }

    /// Undo a partition
    pub fn heal(&self, address: &PeerAddress) {
        self.inner.write().partitioned.remove(address);
    }

    /// Number of exchanges delivered so far
    pub fn exchange_count(&self) -> u64 {
        self.inner.read().exchanges
    }

    fn resolve(&self, peer: &PeerAddress) -> Result<Arc<dyn ExchangeHandler>, TransportError> {
        let inner = self.inner.read();
        if inner.partitioned.contains(peer) {
            return Err(TransportError::ConnectionFailed(format!("{peer} is partitioned")));
        }
        inner
            .handlers
            .get(peer)
            .and_then(Weak::upgrade)
            .ok_or_else(|| TransportError::ConnectionFailed(format!("{peer} is not reachable")))
    }
}

#[async_trait]
impl GossipTransport for LoopbackTransport {
    async fn exchange(
        &self,
        peer: &PeerAddress,
        payload: &GossipPayload,
    ) -> Result<GossipPayload, TransportError> {
        let handler = self.resolve(peer)?;

        let request = GossipPayload::from_json(&payload.to_json()?)?;
        let reply = match handler.handle_exchange(request).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!(peer = %peer, error = %e, "Loopback peer failed to serve exchange");
                return Err(TransportError::Status(500));
            }
        };

        self.inner.write().exchanges += 1;
        Ok(GossipPayload::from_json(&reply.to_json()?)?)
    }
}
