// SledStore - Persistent storage using sled
//
// Layout:
// - one tree per collection ("users", "esp_devices", "commands"), keyed by
//   the natural key's storage bytes, values postcard-encoded
// - one index tree per unique field ("users.username"), value -> owning key

use crate::model::{Entity, StorageKey};
use crate::storage::adapter::{StorageAdapter, StoreError};
use crate::storage::locks::KeyLocks;
use crate::storage::memory::decode_id;
use parking_lot::Mutex;
use std::path::Path;

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Records per collection as (collection, count)
    pub collections: Vec<(String, usize)>,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Persistent store for users, devices and commands
///
/// Uses sled for crash-safe, embedded storage.
/// Writes are serialized so a record and its unique indexes change together.
pub struct SledStore {
    db: sled::Db,
    write_lock: Mutex<()>,
    locks: KeyLocks,
}

impl SledStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self::from_db(db))
    }

    /// Open a store that is removed when dropped
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self::from_db(db))
    }

    fn from_db(db: sled::Db) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
            locks: KeyLocks::default(),
        }
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        let mut collections = Vec::new();
        for kind in crate::model::EntityKind::ALL {
            let tree = self.db.open_tree(kind.collection_name())?;
            collections.push((kind.collection_name().to_string(), tree.len()));
        }
        Ok(StorageStats {
            collections,
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    fn tree<E: Entity>(&self) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(E::KIND.collection_name())?)
    }

    fn index_tree<E: Entity>(&self, field: &str) -> Result<sled::Tree, StoreError> {
        Ok(self
            .db
            .open_tree(format!("{}.{}", E::KIND.collection_name(), field))?)
    }

    fn check_unique<E: Entity>(&self, entity: &E, own_key: &[u8]) -> Result<(), StoreError> {
        for (field, value) in entity.unique_fields() {
            let index = self.index_tree::<E>(field)?;
            if let Some(owner) = index.get(value.as_bytes())? {
                if owner.as_ref() != own_key {
                    return Err(StoreError::UniqueViolation {
                        kind: E::KIND,
                        field,
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    fn unindex<E: Entity>(&self, entity: &E, own_key: &[u8]) -> Result<(), StoreError> {
        for (field, value) in entity.unique_fields() {
            let index = self.index_tree::<E>(field)?;
            if let Some(owner) = index.get(value.as_bytes())? {
                if owner.as_ref() == own_key {
                    index.remove(value.as_bytes())?;
                }
            }
        }
        Ok(())
    }

    fn index<E: Entity>(&self, entity: &E, own_key: &[u8]) -> Result<(), StoreError> {
        for (field, value) in entity.unique_fields() {
            self.index_tree::<E>(field)?
                .insert(value.as_bytes(), own_key)?;
        }
        Ok(())
    }
}

fn encode<E: Entity>(entity: &E) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(entity).map_err(|e| StoreError::SerializationFailed(e.to_string()))
}

fn decode<E: Entity>(bytes: &[u8]) -> Result<E, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

impl StorageAdapter for SledStore {
    fn create<E: Entity>(&self, mut entity: E) -> Result<E, StoreError> {
        let _write = self.write_lock.lock();
        let tree = self.tree::<E>()?;

        if entity.needs_id() {
            let next = match tree.last()? {
                Some((last, _)) => decode_id(&last)? + 1,
                None => 1,
            };
            entity.assign_id(next);
        }

        let key = entity.natural_key();
        let key_bytes = key.to_key_bytes();
        if tree.contains_key(&key_bytes)? {
            return Err(StoreError::AlreadyExists {
                kind: E::KIND,
                key: key.to_string(),
            });
        }
        self.check_unique(&entity, &key_bytes)?;

        tree.insert(key_bytes.as_slice(), encode(&entity)?)?;
        self.index(&entity, &key_bytes)?;
        Ok(entity)
    }

    fn find<E: Entity>(&self, key: &E::Key) -> Result<Option<E>, StoreError> {
        match self.tree::<E>()?.get(key.to_key_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_all<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        let mut records = Vec::new();
        for result in self.tree::<E>()?.iter() {
            let (_, value) = result?;
            records.push(decode(&value)?);
        }
        Ok(records)
    }

    fn update<E: Entity>(&self, entity: &E) -> Result<(), StoreError> {
        let _write = self.write_lock.lock();
        let tree = self.tree::<E>()?;

        let key = entity.natural_key();
        let key_bytes = key.to_key_bytes();
        let previous: E = match tree.get(&key_bytes)? {
            Some(bytes) => decode(&bytes)?,
            None => {
                return Err(StoreError::NotFound {
                    kind: E::KIND,
                    key: key.to_string(),
                })
            }
        };
        self.check_unique(entity, &key_bytes)?;

        tree.insert(key_bytes.as_slice(), encode(entity)?)?;
        self.unindex(&previous, &key_bytes)?;
        self.index(entity, &key_bytes)?;
        Ok(())
    }

    fn delete<E: Entity>(&self, key: &E::Key) -> Result<Option<E>, StoreError> {
        let _write = self.write_lock.lock();
        let key_bytes = key.to_key_bytes();

        match self.tree::<E>()?.remove(&key_bytes)? {
            Some(bytes) => {
                let removed: E = decode(&bytes)?;
                self.unindex(&removed, &key_bytes)?;
                Ok(Some(removed))
            }
            None => Ok(None),
        }
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}
