// MemoryStore - In-process storage for tests and simulations
//
// Keeps one ordered map per entity kind behind a single RwLock. Mirrors the
// sled store's semantics: id allocation, uniqueness checks, key ordering.

use crate::model::{Entity, EntityKind, StorageKey};
use crate::storage::adapter::{StorageAdapter, StoreError};
use crate::storage::locks::KeyLocks;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};

type Table<E> = BTreeMap<Vec<u8>, E>;

/// Volatile store implementing the full storage contract
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<EntityKind, Box<dyn Any + Send + Sync>>>,
    locks: KeyLocks,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of kind `E`
    pub fn count<E: Entity>(&self) -> usize {
        let tables = self.tables.read();
        tables
            .get(&E::KIND)
            .and_then(|t| t.downcast_ref::<Table<E>>())
            .map(|t| t.len())
            .unwrap_or(0)
    }

    fn read_table<E: Entity, R>(&self, f: impl FnOnce(&Table<E>) -> R) -> Result<R, StoreError> {
        let tables = self.tables.read();
        match tables.get(&E::KIND) {
            Some(table) => {
                let table = table
                    .downcast_ref::<Table<E>>()
                    .ok_or_else(|| mismatch(E::KIND))?;
                Ok(f(table))
            }
            None => Ok(f(&Table::new())),
        }
    }

    fn write_table<E: Entity, R>(
        &self,
        f: impl FnOnce(&mut Table<E>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut tables = self.tables.write();
        let table = tables
            .entry(E::KIND)
            .or_insert_with(|| Box::new(Table::<E>::new()))
            .downcast_mut::<Table<E>>()
            .ok_or_else(|| mismatch(E::KIND))?;
        f(table)
    }
}

fn mismatch(kind: EntityKind) -> StoreError {
    StoreError::DatabaseError(format!("table {} holds an unexpected record type", kind))
}

/// Reject `entity` if another record (key != `own_key`) holds one of its unique values
fn check_unique<E: Entity>(table: &Table<E>, entity: &E, own_key: &[u8]) -> Result<(), StoreError> {
    for (field, value) in entity.unique_fields() {
        let taken = table.iter().any(|(key, other)| {
            key.as_slice() != own_key
                && other
                    .unique_fields()
                    .iter()
                    .any(|(f, v)| *f == field && *v == value)
        });
        if taken {
            return Err(StoreError::UniqueViolation {
                kind: E::KIND,
                field,
                value,
            });
        }
    }
    Ok(())
}

impl StorageAdapter for MemoryStore {
    fn create<E: Entity>(&self, mut entity: E) -> Result<E, StoreError> {
        self.write_table::<E, _>(|table| {
            if entity.needs_id() {
                let next = match table.keys().next_back() {
                    Some(last) => decode_id(last)? + 1,
                    None => 1,
                };
                entity.assign_id(next);
            }

            let key = entity.natural_key();
            let key_bytes = key.to_key_bytes();
            if table.contains_key(&key_bytes) {
                return Err(StoreError::AlreadyExists {
                    kind: E::KIND,
                    key: key.to_string(),
                });
            }
            check_unique(table, &entity, &key_bytes)?;

            table.insert(key_bytes, entity.clone());
            Ok(entity)
        })
    }

    fn find<E: Entity>(&self, key: &E::Key) -> Result<Option<E>, StoreError> {
        self.read_table::<E, _>(|table| table.get(&key.to_key_bytes()).cloned())
    }

    fn list_all<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        self.read_table::<E, _>(|table| table.values().cloned().collect())
    }

    fn update<E: Entity>(&self, entity: &E) -> Result<(), StoreError> {
        self.write_table::<E, _>(|table| {
            let key = entity.natural_key();
            let key_bytes = key.to_key_bytes();
            if !table.contains_key(&key_bytes) {
                return Err(StoreError::NotFound {
                    kind: E::KIND,
                    key: key.to_string(),
                });
            }
            check_unique(table, entity, &key_bytes)?;

            table.insert(key_bytes, entity.clone());
            Ok(())
        })
    }

    fn delete<E: Entity>(&self, key: &E::Key) -> Result<Option<E>, StoreError> {
        self.write_table::<E, _>(|table| Ok(table.remove(&key.to_key_bytes())))
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}

pub(crate) fn decode_id(bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::DeserializationFailed("Invalid id key length".to_string()))?;
    Ok(u64::from_be_bytes(arr))
}
