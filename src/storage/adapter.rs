// Storage Adapter - The keyed CRUD contract
//
// The serving path, the payload builder and the merge engine all go through
// this trait, so replicated state and directly written state share one code
// path.

use crate::model::{Entity, EntityKind};
use crate::storage::locks::{KeyGuard, KeyLocks};
use thiserror::Error;

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    #[error("{kind} record {key} already exists")]
    AlreadyExists { kind: EntityKind, key: String },

    #[error("{kind} record {key} not found")]
    NotFound { kind: EntityKind, key: String },

    #[error("{kind}.{field} value {value:?} is already taken")]
    UniqueViolation {
        kind: EntityKind,
        field: &'static str,
        value: String,
    },
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Keyed CRUD access to the replicated collections.
///
/// Operations are individually atomic. Callers that read, decide and then
/// write a record hold `lock_key` for that record across the sequence.
pub trait StorageAdapter: Send + Sync + 'static {
    /// Insert a new record, allocating a synthetic id if the record has none.
    /// Returns the record as stored.
    fn create<E: Entity>(&self, entity: E) -> Result<E, StoreError>;

    /// Look up a record by natural key
    fn find<E: Entity>(&self, key: &E::Key) -> Result<Option<E>, StoreError>;

    /// All records of a kind, in natural-key order
    fn list_all<E: Entity>(&self) -> Result<Vec<E>, StoreError>;

    /// Replace an existing record (matched by natural key) with `entity`
    fn update<E: Entity>(&self, entity: &E) -> Result<(), StoreError>;

    /// Remove a record, returning it if it existed
    fn delete<E: Entity>(&self, key: &E::Key) -> Result<Option<E>, StoreError>;

    /// The per-key lock table for this store
    fn key_locks(&self) -> &KeyLocks;

    /// Lock the record `key` of kind `E`
    fn lock_key<E: Entity>(&self, key: &E::Key) -> KeyGuard<'_> {
        self.key_locks().lock(E::KIND, key)
    }
}
