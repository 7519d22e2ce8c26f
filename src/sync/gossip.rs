// Gossip Engine - One node's side of the anti-entropy protocol
//
// Push-pull in a single round trip:
// - Initiator: snapshot local state, send it to one peer, merge the reply
// - Responder: merge the incoming snapshot, reply with its own snapshot
//
// Failures never escape a round. They are logged and counted, and the next
// scheduled round starts from scratch.

use crate::storage::{StorageAdapter, StoreError};
use crate::sync::merge::{MergeEngine, MergeReport};
use crate::sync::peer::PeerSelector;
use crate::sync::protocol::{GossipPayload, ProtocolError};
use crate::sync::snapshot::PayloadBuilder;
use crate::sync::version::{VersionTracker, VersionVector};
use crate::transport::{ExchangeHandler, GossipTransport, PeerAddress, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Gossip-related errors
#[derive(Error, Debug)]
pub enum GossipError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Configuration for the gossip engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Seconds between exchange rounds
    pub interval_secs: u64,
    /// Run the periodic scheduler at all
    pub enabled: bool,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            enabled: true,
        }
    }
}

impl GossipConfig {
    /// Create a new config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set round interval
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Enable or disable the scheduler
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Round interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Statistics about the gossip engine
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GossipStats {
    pub rounds_started: u64,
    pub rounds_completed: u64,
    pub rounds_failed: u64,
    pub rounds_skipped: u64,
    pub exchanges_served: u64,
    pub records_changed: u64,
    pub records_failed: u64,
}

/// Result of one initiator round
#[derive(Debug)]
pub enum RoundOutcome {
    /// No peers configured; nothing to do
    NoPeers,
    /// Another round was still in flight
    AlreadyRunning,
    /// The exchange completed and the peer's reply was merged
    Completed { peer: PeerAddress, report: MergeReport },
    /// The round was abandoned
    Failed { peer: PeerAddress, error: GossipError },
}

impl RoundOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RoundOutcome::Completed { .. })
    }
}

/// Clears the in-flight flag when a round ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The gossip engine - orchestrates state synchronization for one node
pub struct GossipEngine<S> {
    node_name: String,
    store: Arc<S>,
    versions: Arc<VersionTracker>,
    builder: PayloadBuilder<S>,
    merger: MergeEngine<S>,
    peers: PeerSelector,
    transport: Arc<dyn GossipTransport>,
    in_flight: AtomicBool,
    stats: Mutex<GossipStats>,
}

impl<S: StorageAdapter> GossipEngine<S> {
    /// Create a new gossip engine over `store`
    pub fn new(
        node_name: &str,
        store: Arc<S>,
        peers: PeerSelector,
        transport: Arc<dyn GossipTransport>,
    ) -> Self {
        let versions = Arc::new(VersionTracker::new());
        Self {
            node_name: node_name.to_string(),
            builder: PayloadBuilder::new(store.clone(), versions.clone(), node_name),
            merger: MergeEngine::new(store.clone(), versions.clone()),
            store,
            versions,
            peers,
            transport,
            in_flight: AtomicBool::new(false),
            stats: Mutex::new(GossipStats::default()),
        }
    }

    /// Get this node's name
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Get the underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the configured peers
    pub fn peers(&self) -> &PeerSelector {
        &self.peers
    }

    /// Get the current version summary
    pub fn version_vector(&self) -> VersionVector {
        self.versions.snapshot()
    }

    /// Get statistics
    pub fn stats(&self) -> GossipStats {
        self.stats.lock().clone()
    }

    /// Check whether a round is currently running
    pub fn is_round_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    // ========================================================================
    // LOCAL STATE
    // ========================================================================

    /// Snapshot local state (runs on the blocking pool)
    pub async fn snapshot(&self) -> Result<GossipPayload, GossipError> {
        let builder = self.builder.clone();
        let payload = tokio::task::spawn_blocking(move || builder.build())
            .await
            .map_err(|e| GossipError::TaskFailed(e.to_string()))??;
        Ok(payload)
    }

    /// Merge a remote payload into local state (runs on the blocking pool)
    pub async fn merge(&self, remote: GossipPayload) -> Result<MergeReport, GossipError> {
        let merger = self.merger.clone();
        let report = tokio::task::spawn_blocking(move || merger.merge_payload(&remote))
            .await
            .map_err(|e| GossipError::TaskFailed(e.to_string()))?;

        let mut stats = self.stats.lock();
        stats.records_changed += report.changed() as u64;
        stats.records_failed += report.failed() as u64;
        Ok(report)
    }

    // ========================================================================
    // INITIATOR
    // ========================================================================

    /// Run one round against a randomly selected peer
    pub async fn run_round(&self) -> RoundOutcome {
        let peer = match self.peers.select() {
            Some(peer) => peer.clone(),
            None => {
                self.stats.lock().rounds_skipped += 1;
                debug!(node = %self.node_name, "No peers configured, skipping round");
                return RoundOutcome::NoPeers;
            }
        };
        self.exchange_with(&peer).await
    }

    /// Run one round against a specific peer
    pub async fn exchange_with(&self, peer: &PeerAddress) -> RoundOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.stats.lock().rounds_skipped += 1;
            debug!(node = %self.node_name, "Previous round still in flight, skipping");
            return RoundOutcome::AlreadyRunning;
        }
        let _in_flight = InFlight(&self.in_flight);

        self.stats.lock().rounds_started += 1;
        let started = Instant::now();

        match self.try_exchange(peer).await {
            Ok(report) => {
                self.stats.lock().rounds_completed += 1;
                info!(
                    node = %self.node_name,
                    peer = %peer,
                    changed = report.changed(),
                    failed = report.failed(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Gossip round completed"
                );
                RoundOutcome::Completed {
                    peer: peer.clone(),
                    report,
                }
            }
            Err(error) => {
                self.stats.lock().rounds_failed += 1;
                warn!(
                    node = %self.node_name,
                    peer = %peer,
                    error = %error,
                    "Gossip round abandoned"
                );
                RoundOutcome::Failed {
                    peer: peer.clone(),
                    error,
                }
            }
        }
    }

    async fn try_exchange(&self, peer: &PeerAddress) -> Result<MergeReport, GossipError> {
        let local = self.snapshot().await?;
        let remote = self.transport.exchange(peer, &local).await?;
        self.merge(remote).await
    }

    // ========================================================================
    // RESPONDER
    // ========================================================================

    /// Serve an exchange pushed by a peer.
    ///
    /// This is not a read-only call: the peer's payload is merged into local
    /// storage first, and the reply is the snapshot taken after that merge.
    pub async fn serve_exchange(
        &self,
        remote: GossipPayload,
    ) -> Result<GossipPayload, GossipError> {
        let local_versions = self.versions.snapshot();
        debug!(
            node = %self.node_name,
            sender = %remote.sender_name(),
            records = remote.entity_count(),
            peer_ahead = remote.version_vector.is_ahead_of(&local_versions),
            "Serving gossip exchange"
        );

        let sender = remote.sender_name().to_string();
        let report = self.merge(remote).await?;
        let reply = self.snapshot().await?;

        self.stats.lock().exchanges_served += 1;
        info!(
            node = %self.node_name,
            sender = %sender,
            changed = report.changed(),
            failed = report.failed(),
            "Gossip exchange served"
        );
        Ok(reply)
    }
}

#[async_trait]
impl<S: StorageAdapter> ExchangeHandler for GossipEngine<S> {
    fn node_name(&self) -> &str {
        &self.node_name
    }

    fn version_vector(&self) -> VersionVector {
        self.versions.snapshot()
    }

    async fn handle_exchange(&self, remote: GossipPayload) -> Result<GossipPayload, GossipError> {
        self.serve_exchange(remote).await
    }
}
