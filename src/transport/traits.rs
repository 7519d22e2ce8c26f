// Transport Traits and Core Types
// Defines the exchange contract between nodes and the types shared by the
// HTTP and loopback implementations

use crate::sync::{GossipError, GossipPayload, ProtocolError, VersionVector};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Path of the peer-to-peer exchange endpoint
pub const GOSSIP_PATH: &str = "/gossip";

/// Path of the liveness endpoint
pub const HEALTH_PATH: &str = "/health";

// ============================================================================
// TRANSPORT CONFIG
// ============================================================================

/// Configuration for gossip transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Whole-exchange timeout on the initiator side, in seconds
    pub request_timeout_secs: u64,
    /// Connection establishment timeout, in seconds
    pub connect_timeout_secs: u64,
    /// Responder-side request timeout, in seconds
    pub server_timeout_secs: u64,
    /// Largest accepted payload body, in bytes
    pub max_payload_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 5,
            connect_timeout_secs: 5,
            server_timeout_secs: 30,
            max_payload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_server_timeout(mut self, secs: u64) -> Self {
        self.server_timeout_secs = secs;
        self
    }

    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.request_timeout_secs == 0 {
            return Err(TransportError::InvalidConfig(
                "request_timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(TransportError::InvalidConfig(
                "connect_timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.server_timeout_secs == 0 {
            return Err(TransportError::InvalidConfig(
                "server_timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(TransportError::InvalidConfig(
                "max_payload_bytes cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// PEER ADDRESS
// ============================================================================

/// A peer's HTTP endpoint, "host:port"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    /// Create from host and port
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// Parse "host:port", optionally prefixed with "http://"
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let trimmed = raw.trim();
        let without_scheme = trimmed.strip_prefix("http://").unwrap_or(trimmed);
        let authority = without_scheme.trim_end_matches('/');

        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| TransportError::InvalidAddress(format!("{raw}: missing port")))?;
        if host.is_empty() || host.contains('/') {
            return Err(TransportError::InvalidAddress(format!("{raw}: invalid host")));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| TransportError::InvalidAddress(format!("{raw}: invalid port")))?;
        if port == 0 {
            return Err(TransportError::InvalidAddress(format!("{raw}: port cannot be 0")));
        }

        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// "http://host:port"
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// URL of the peer's exchange endpoint
    pub fn gossip_url(&self) -> String {
        format!("{}{}", self.base_url(), GOSSIP_PATH)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = TransportError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<PeerAddress> for String {
    fn from(address: PeerAddress) -> Self {
        address.to_string()
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Transport errors. All of them abandon the current round only.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Exchange timed out")]
    Timeout,

    #[error("Peer answered with status {0}")]
    Status(u16),

    #[error("Payload error: {0}")]
    Protocol(#[from] ProtocolError),
}

// ============================================================================
// TRAITS
// ============================================================================

/// Client side: push a payload to a peer, get the peer's payload back
#[async_trait]
pub trait GossipTransport: Send + Sync {
    async fn exchange(
        &self,
        peer: &PeerAddress,
        payload: &GossipPayload,
    ) -> Result<GossipPayload, TransportError>;
}

/// Server side: what a node does with a payload pushed to it
#[async_trait]
pub trait ExchangeHandler: Send + Sync {
    /// Name of the serving node
    fn node_name(&self) -> &str;

    /// The node's current version summary
    fn version_vector(&self) -> VersionVector;

    /// Merge `remote` locally and return the post-merge local snapshot
    async fn handle_exchange(&self, remote: GossipPayload) -> Result<GossipPayload, GossipError>;
}
