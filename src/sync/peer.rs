// Peer Selection - Static peer list, one random target per round
//
// The peer list comes from configuration and never changes at runtime.
// Selection does no liveness check; unreachable peers surface as transport
// failures for that round.

use crate::transport::PeerAddress;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

/// Peer-related errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Invalid peer address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Configured peers of this node, self excluded
#[derive(Clone, Debug, Default)]
pub struct PeerSelector {
    peers: Vec<PeerAddress>,
}

impl PeerSelector {
    /// Build from addresses, dropping duplicates and `self_address`
    pub fn new<I>(peers: I, self_address: Option<&PeerAddress>) -> Self
    where
        I: IntoIterator<Item = PeerAddress>,
    {
        let mut unique: Vec<PeerAddress> = Vec::new();
        for peer in peers {
            if Some(&peer) == self_address || unique.contains(&peer) {
                continue;
            }
            unique.push(peer);
        }
        Self { peers: unique }
    }

    /// Parse a configured list of "host:port" strings
    pub fn from_strings(
        peers: &[String],
        self_address: Option<&PeerAddress>,
    ) -> Result<Self, PeerError> {
        let parsed = peers
            .iter()
            .map(|raw| {
                PeerAddress::parse(raw).map_err(|e| PeerError::InvalidAddress {
                    address: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(parsed, self_address))
    }

    /// Check if there is nobody to gossip with
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Get number of peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Get all peers
    pub fn peers(&self) -> &[PeerAddress] {
        &self.peers
    }

    /// Pick one peer uniformly at random
    pub fn select(&self) -> Option<&PeerAddress> {
        self.select_with(&mut rand::thread_rng())
    }

    /// Pick one peer uniformly at random using `rng`
    pub fn select_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&PeerAddress> {
        self.peers.choose(rng)
    }
}
