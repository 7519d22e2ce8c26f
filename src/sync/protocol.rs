// Protocol - The gossip payload
//
// One schema travels in both directions of an exchange: the sender's full
// replicable state plus its version summary. Payloads are JSON on the wire
// and carry an explicit protocol version so the schema can evolve.

use crate::model::{Command, Device, Entity, User};
use crate::sync::version::VersionVector;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Highest payload schema version this node understands
pub const PROTOCOL_VERSION: u32 = 1;

/// Version assumed for payloads that carry no version tag
fn untagged_protocol_version() -> u32 {
    1
}

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Unsupported protocol version {got} (supported up to {supported})")]
    UnsupportedVersion { got: u32, supported: u32 },

    #[error("Payload too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },
}

/// Full-state snapshot exchanged between nodes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GossipPayload {
    #[serde(default = "untagged_protocol_version")]
    pub protocol_version: u32,
    /// Name of the node that built the payload
    #[serde(default)]
    pub sender: Option<String>,
    /// Per-kind high-water marks; informational only
    #[serde(default)]
    pub version_vector: VersionVector,
    pub commands: Vec<Command>,
    pub esp_devices: Vec<Device>,
    pub users: Vec<User>,
}

impl GossipPayload {
    /// Create a payload at the current protocol version
    pub fn new(
        sender: &str,
        version_vector: VersionVector,
        commands: Vec<Command>,
        esp_devices: Vec<Device>,
        users: Vec<User>,
    ) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            sender: Some(sender.to_string()),
            version_vector,
            commands,
            esp_devices,
            users,
        }
    }

    /// A payload with no records
    pub fn empty(sender: &str) -> Self {
        Self::new(sender, VersionVector::default(), Vec::new(), Vec::new(), Vec::new())
    }

    /// Total number of records carried
    pub fn entity_count(&self) -> usize {
        self.commands.len() + self.esp_devices.len() + self.users.len()
    }

    /// Sender name for logging
    pub fn sender_name(&self) -> &str {
        self.sender.as_deref().unwrap_or("unknown")
    }

    /// Encode for the wire
    pub fn to_json(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::SerializationFailed(e.to_string()))
    }

    /// Decode from the wire.
    ///
    /// Decoding is all-or-nothing: a payload that fails to decode yields no
    /// records at all.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let payload: Self = serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::DeserializationFailed(e.to_string()))?;

        if payload.protocol_version == 0 || payload.protocol_version > PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                got: payload.protocol_version,
                supported: PROTOCOL_VERSION,
            });
        }
        Ok(payload)
    }

    /// Decode, rejecting bodies larger than `limit` bytes
    pub fn from_json_limited(bytes: &[u8], limit: usize) -> Result<Self, ProtocolError> {
        if bytes.len() > limit {
            return Err(ProtocolError::MessageTooLarge {
                size: bytes.len(),
                limit,
            });
        }
        Self::from_json(bytes)
    }

    /// Hex digest of the replicated records, independent of sender, version
    /// summary and record order. Two nodes with equal digests hold the same
    /// replicable state.
    pub fn state_digest(&self) -> String {
        let mut commands = self.commands.clone();
        commands.sort_by_key(|c| c.natural_key());
        let mut devices = self.esp_devices.clone();
        devices.sort_by_key(|d| d.natural_key());
        let mut users = self.users.clone();
        users.sort_by_key(|u| u.natural_key());

        let mut hasher = Sha256::new();
        hasher.update(b"relaymesh:state:");
        // Vec<Entity> serialization cannot fail
        hasher.update(serde_json::to_vec(&(commands, devices, users)).unwrap_or_default());
        hex::encode(hasher.finalize())
    }
}
