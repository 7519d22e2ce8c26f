// Node configuration, loaded from TOML
//
// Every field has a default so an empty file (or no file) yields a runnable
// single-node setup. The CLI overrides a handful of fields after loading.

use crate::sync::{GossipConfig, PeerError, PeerSelector};
use crate::transport::{PeerAddress, TransportConfig, TransportError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Configuration for one relay node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name used in logs and as the payload sender
    pub node_name: String,
    /// Socket address the HTTP server binds
    pub listen_address: String,
    /// Address peers use to reach this node; excluded from its own peer list
    pub advertise_address: Option<String>,
    /// Directory holding the sled database
    pub data_dir: PathBuf,
    /// Static peer list, "host:port"
    pub peers: Vec<String>,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
    pub gossip: GossipConfig,
    pub transport: TransportConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "relay".to_string(),
            listen_address: "0.0.0.0:5000".to_string(),
            advertise_address: None,
            data_dir: PathBuf::from("relay-data"),
            peers: Vec::new(),
            log_level: "info".to_string(),
            gossip: GossipConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::Invalid("node_name cannot be empty".to_string()));
        }
        self.listen_socket()?;
        if self.gossip.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "gossip.interval_secs cannot be 0".to_string(),
            ));
        }
        self.transport.validate()?;
        self.advertise()?;
        for peer in &self.peers {
            PeerAddress::parse(peer)?;
        }
        Ok(())
    }

    /// Parsed listen address
    pub fn listen_socket(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("invalid listen_address {}", self.listen_address))
        })
    }

    fn advertise(&self) -> Result<Option<PeerAddress>, ConfigError> {
        Ok(self
            .advertise_address
            .as_deref()
            .map(PeerAddress::parse)
            .transpose()?)
    }

    /// Peer selector over the configured peers, minus this node itself
    pub fn peer_selector(&self) -> Result<PeerSelector, ConfigError> {
        let own = self.advertise()?;
        Ok(PeerSelector::from_strings(&self.peers, own.as_ref())?)
    }

    pub fn with_node_name(mut self, name: &str) -> Self {
        self.node_name = name.to_string();
        self
    }

    pub fn with_listen_address(mut self, address: &str) -> Self {
        self.listen_address = address.to_string();
        self
    }

    pub fn with_advertise_address(mut self, address: &str) -> Self {
        self.advertise_address = Some(address.to_string());
        self
    }

    pub fn with_data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_peers(mut self, peers: Vec<String>) -> Self {
        self.peers = peers;
        self
    }

    pub fn with_gossip(mut self, gossip: GossipConfig) -> Self {
        self.gossip = gossip;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}
