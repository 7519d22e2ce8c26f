// Storage module - PERSISTENCE
// One storage contract shared by the serving path and the replication path,
// backed by sled on disk or by an in-memory map in tests

mod adapter;
mod locks;
mod memory;
mod store;

pub use adapter::{StorageAdapter, StoreError};
pub use locks::{KeyGuard, KeyLocks};
pub use memory::MemoryStore;
pub use store::{SledStore, StorageStats};
