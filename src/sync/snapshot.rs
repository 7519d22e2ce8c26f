// Payload Builder - Snapshot local state for an exchange
//
// Reads every replicable collection in full. No filtering by time or peer:
// each exchange ships O(total rows).

use crate::model::{Command, Device, User};
use crate::storage::{StorageAdapter, StoreError};
use crate::sync::protocol::GossipPayload;
use crate::sync::version::VersionTracker;
use std::sync::Arc;

/// Builds full-state payloads from local storage
pub struct PayloadBuilder<S> {
    store: Arc<S>,
    versions: Arc<VersionTracker>,
    sender: String,
}

impl<S> Clone for PayloadBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            versions: Arc::clone(&self.versions),
            sender: self.sender.clone(),
        }
    }
}

impl<S: StorageAdapter> PayloadBuilder<S> {
    pub fn new(store: Arc<S>, versions: Arc<VersionTracker>, sender: &str) -> Self {
        Self {
            store,
            versions,
            sender: sender.to_string(),
        }
    }

    /// Snapshot commands, devices and users with the current version summary
    pub fn build(&self) -> Result<GossipPayload, StoreError> {
        let commands: Vec<Command> = self.store.list_all()?;
        let devices: Vec<Device> = self.store.list_all()?;
        let users: Vec<User> = self.store.list_all()?;

        self.versions.observe_all(&commands);
        self.versions.observe_all(&devices);
        self.versions.observe_all(&users);

        Ok(GossipPayload::new(
            &self.sender,
            self.versions.snapshot(),
            commands,
            devices,
            users,
        ))
    }
}
