// Entities - The three replicated record types
//
// Each record carries a natural key (the cross-node identity) and an
// `updated_at` timestamp used for last-write-wins conflict resolution.

use crate::model::clock::{self, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// The replicated collections
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Device,
    Command,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Command, EntityKind::Device, EntityKind::User];

    /// Collection name, as used on the wire and for storage trees
    pub fn collection_name(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Device => "esp_devices",
            EntityKind::Command => "commands",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// A natural key that can be laid out as ordered storage bytes
pub trait StorageKey: Clone + fmt::Debug + fmt::Display + Eq + Hash + Send + Sync + 'static {
    fn to_key_bytes(&self) -> Vec<u8>;
}

impl StorageKey for u64 {
    // Big-endian so byte order matches numeric order (FIFO scans).
    fn to_key_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

impl StorageKey for String {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

/// A record that can be stored and replicated
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Key: StorageKey;

    const KIND: EntityKind;

    /// Cross-node identity of this record
    fn natural_key(&self) -> Self::Key;

    /// Last-write-wins timestamp
    fn updated_at(&self) -> Timestamp;

    /// False when the natural key is unset (id 0, empty device id)
    fn has_natural_key(&self) -> bool;

    /// Whether storage must allocate a synthetic id on create
    fn needs_id(&self) -> bool {
        false
    }

    /// Install a storage-allocated synthetic id
    fn assign_id(&mut self, _id: u64) {}

    /// Fields that must be unique within the collection, as (name, value)
    fn unique_fields(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

// ============================================================================
// USER
// ============================================================================

/// An operator account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub updated_at: Timestamp,
}

impl User {
    /// Create an unsaved user (id is allocated on create)
    pub fn new(username: &str, password_hash: &str) -> Self {
        Self {
            id: 0,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            updated_at: clock::now(),
        }
    }

    /// Replace the password hash and advance the timestamp
    pub fn set_password_hash(&mut self, password_hash: &str) {
        self.password_hash = password_hash.to_string();
        self.touch();
    }

    /// Advance `updated_at` past its current value
    pub fn touch(&mut self) {
        self.updated_at = clock::advance(self.updated_at);
    }
}

impl Entity for User {
    type Key = u64;

    const KIND: EntityKind = EntityKind::User;

    fn natural_key(&self) -> u64 {
        self.id
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn has_natural_key(&self) -> bool {
        self.id != 0
    }

    fn needs_id(&self) -> bool {
        self.id == 0
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_fields(&self) -> Vec<(&'static str, String)> {
        vec![("username", self.username.clone())]
    }
}

// ============================================================================
// DEVICE
// ============================================================================

/// An embedded device that polls for commands
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub esp_id: String,
    pub esp_secret_key: String,
    pub last_request_time: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Device {
    /// Create a device that has never polled
    pub fn new(esp_id: &str, esp_secret_key: &str) -> Self {
        Self {
            esp_id: esp_id.to_string(),
            esp_secret_key: esp_secret_key.to_string(),
            last_request_time: None,
            updated_at: clock::now(),
        }
    }

    /// Check a presented secret against the stored one
    pub fn verify_secret(&self, secret: &str) -> bool {
        self.esp_secret_key == secret
    }

    /// Record a poll at `at` and advance the timestamp
    pub fn record_poll(&mut self, at: Timestamp) {
        self.last_request_time = Some(at);
        self.touch();
    }

    /// Advance `updated_at` past its current value
    pub fn touch(&mut self) {
        self.updated_at = clock::advance(self.updated_at);
    }
}

impl Entity for Device {
    type Key = String;

    const KIND: EntityKind = EntityKind::Device;

    fn natural_key(&self) -> String {
        self.esp_id.clone()
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn has_natural_key(&self) -> bool {
        !self.esp_id.is_empty()
    }
}

// ============================================================================
// COMMAND
// ============================================================================

/// A command queued for a device, delivered in id order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub esp_id: String,
    pub command: String,
    pub updated_at: Timestamp,
}

impl Command {
    /// Create an unsaved command (id is allocated on create)
    pub fn new(esp_id: &str, command: &str) -> Self {
        Self {
            id: 0,
            esp_id: esp_id.to_string(),
            command: command.to_string(),
            updated_at: clock::now(),
        }
    }

    /// Advance `updated_at` past its current value
    pub fn touch(&mut self) {
        self.updated_at = clock::advance(self.updated_at);
    }
}

impl Entity for Command {
    type Key = u64;

    const KIND: EntityKind = EntityKind::Command;

    fn natural_key(&self) -> u64 {
        self.id
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn has_natural_key(&self) -> bool {
        self.id != 0
    }

    fn needs_id(&self) -> bool {
        self.id == 0
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }
}
