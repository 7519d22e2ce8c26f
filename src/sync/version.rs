// Version Tracking - Per-kind high-water marks
//
// Each node remembers, per entity kind, the latest `updated_at` it has
// observed locally or from a peer. The summary rides along in every payload.
// It is informational: it never filters what a node sends and never gates a
// merge, which is decided record by record.

use crate::model::{Entity, EntityKind, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Latest observed `updated_at` per entity kind
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionVector {
    #[serde(default)]
    pub commands: Option<Timestamp>,
    #[serde(default)]
    pub esp_devices: Option<Timestamp>,
    #[serde(default)]
    pub users: Option<Timestamp>,
}

impl VersionVector {
    /// High-water mark for a kind
    pub fn get(&self, kind: EntityKind) -> Option<Timestamp> {
        match kind {
            EntityKind::Command => self.commands,
            EntityKind::Device => self.esp_devices,
            EntityKind::User => self.users,
        }
    }

    fn slot_mut(&mut self, kind: EntityKind) -> &mut Option<Timestamp> {
        match kind {
            EntityKind::Command => &mut self.commands,
            EntityKind::Device => &mut self.esp_devices,
            EntityKind::User => &mut self.users,
        }
    }

    /// Raise the mark for `kind` to `at` if later. Returns true if it moved.
    pub fn observe(&mut self, kind: EntityKind, at: Timestamp) -> bool {
        let slot = self.slot_mut(kind);
        if slot.map_or(true, |current| at > current) {
            *slot = Some(at);
            true
        } else {
            false
        }
    }

    /// Pointwise maximum with another vector
    pub fn merge(&mut self, other: &VersionVector) {
        for kind in EntityKind::ALL {
            if let Some(at) = other.get(kind) {
                self.observe(kind, at);
            }
        }
    }

    /// True if `self` has seen something later than `other` for any kind
    pub fn is_ahead_of(&self, other: &VersionVector) -> bool {
        EntityKind::ALL
            .iter()
            .any(|kind| self.get(*kind) > other.get(*kind))
    }
}

/// Shared, thread-safe version summary for one node
#[derive(Debug, Default)]
pub struct VersionTracker {
    vector: Mutex<VersionVector>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed timestamp
    pub fn observe(&self, kind: EntityKind, at: Timestamp) {
        self.vector.lock().observe(kind, at);
    }

    /// Record every record of a collection
    pub fn observe_all<E: Entity>(&self, records: &[E]) {
        let mut vector = self.vector.lock();
        for record in records {
            vector.observe(E::KIND, record.updated_at());
        }
    }

    /// Current summary
    pub fn snapshot(&self) -> VersionVector {
        self.vector.lock().clone()
    }
}
