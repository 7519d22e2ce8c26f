// Merge Engine - Reconcile a remote payload into local storage
//
// Per remote record, under the lock for its natural key:
// - no local record: insert the remote one verbatim
// - remote strictly newer: replace the whole local record
// - otherwise (older or equal timestamp): keep local
//
// Records are independent. One that fails to apply is logged and skipped.
// Deletes are not represented, so a peer still holding a command this node
// already delivered will bring it back; consumers must tolerate re-delivery.

use crate::model::{Entity, EntityKind};
use crate::storage::{StorageAdapter, StoreError};
use crate::sync::protocol::GossipPayload;
use crate::sync::version::VersionTracker;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors applying a single remote record
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Remote {0} record has no natural key")]
    MissingKey(EntityKind),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one remote record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local record existed; the remote one was inserted
    Inserted,
    /// The remote record was newer and replaced the local one
    Replaced,
    /// The local record was as new or newer and was kept
    KeptLocal,
}

/// Counters for one entity kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindReport {
    pub inserted: usize,
    pub replaced: usize,
    pub kept_local: usize,
    pub failed: usize,
}

impl KindReport {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Replaced => self.replaced += 1,
            MergeOutcome::KeptLocal => self.kept_local += 1,
        }
    }

    /// Records that changed local state
    pub fn changed(&self) -> usize {
        self.inserted + self.replaced
    }
}

/// Result of merging one payload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub commands: KindReport,
    pub devices: KindReport,
    pub users: KindReport,
}

impl MergeReport {
    /// Records that changed local state, all kinds
    pub fn changed(&self) -> usize {
        self.commands.changed() + self.devices.changed() + self.users.changed()
    }

    /// Records skipped because they failed to apply, all kinds
    pub fn failed(&self) -> usize {
        self.commands.failed + self.devices.failed + self.users.failed
    }
}

/// Applies remote records with per-record last-write-wins
pub struct MergeEngine<S> {
    store: Arc<S>,
    versions: Arc<VersionTracker>,
}

impl<S> Clone for MergeEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            versions: Arc::clone(&self.versions),
        }
    }
}

impl<S: StorageAdapter> MergeEngine<S> {
    pub fn new(store: Arc<S>, versions: Arc<VersionTracker>) -> Self {
        Self { store, versions }
    }

    /// Merge every collection of a payload.
    ///
    /// The payload's version summary is not consulted.
    pub fn merge_payload(&self, payload: &GossipPayload) -> MergeReport {
        MergeReport {
            commands: self.merge_collection(&payload.commands),
            devices: self.merge_collection(&payload.esp_devices),
            users: self.merge_collection(&payload.users),
        }
    }

    /// Merge a batch of remote records of one kind
    pub fn merge_collection<E: Entity>(&self, remote: &[E]) -> KindReport {
        let mut report = KindReport::default();

        for record in remote {
            match self.merge_entity(record) {
                Ok(outcome) => {
                    self.versions.observe(E::KIND, record.updated_at());
                    report.record(outcome);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        kind = %E::KIND,
                        key = %record.natural_key(),
                        error = %e,
                        "Skipping remote record"
                    );
                }
            }
        }

        report
    }

    /// Merge a single remote record
    pub fn merge_entity<E: Entity>(&self, remote: &E) -> Result<MergeOutcome, MergeError> {
        if !remote.has_natural_key() {
            return Err(MergeError::MissingKey(E::KIND));
        }

        let key = remote.natural_key();
        let _guard = self.store.lock_key::<E>(&key);

        match self.store.find::<E>(&key)? {
            None => match self.store.create(remote.clone()) {
                Ok(_) => Ok(MergeOutcome::Inserted),
                // A local create allocated this id after the lookup. Id
                // allocation does not take the key lock, so compare again.
                Err(StoreError::AlreadyExists { .. }) => match self.store.find::<E>(&key)? {
                    Some(local) => self.resolve(remote, &local),
                    None => Err(StoreError::NotFound {
                        kind: E::KIND,
                        key: key.to_string(),
                    }
                    .into()),
                },
                Err(e) => Err(e.into()),
            },
            Some(local) => self.resolve(remote, &local),
        }
    }

    fn resolve<E: Entity>(&self, remote: &E, local: &E) -> Result<MergeOutcome, MergeError> {
        if remote.updated_at() > local.updated_at() {
            self.store.update(remote)?;
            Ok(MergeOutcome::Replaced)
        } else {
            Ok(MergeOutcome::KeptLocal)
        }
    }
}
