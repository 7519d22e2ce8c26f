//! # relaymesh
//!
//! Peer-to-peer replication for a device command relay. Every node keeps a
//! full copy of users, devices and queued commands, and periodically swaps
//! its whole state with one random peer over `POST /gossip`. Records merge
//! last-writer-wins on `updated_at`, so any two nodes that keep exchanging
//! converge without coordination.
//!
//! ```text
//!  scheduler ──tick──► GossipEngine ──snapshot──► transport ──► peer /gossip
//!                          ▲                                        │
//!                          └──────────── merge reply ◄──────────────┘
//! ```

pub mod config;
pub mod model;
pub mod queue;
pub mod storage;
pub mod sync;
pub mod transport;

pub use config::{ConfigError, NodeConfig};
pub use model::{Command, Device, Entity, EntityKind, User};
pub use queue::{CommandQueue, QueueError};
pub use storage::{MemoryStore, SledStore, StorageAdapter, StoreError};
pub use sync::{GossipEngine, GossipPayload, GossipScheduler, MergeEngine, PeerSelector};
pub use transport::{HttpTransport, LoopbackTransport, PeerAddress, TransportConfig};
