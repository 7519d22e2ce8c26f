// Model module - WHAT GETS REPLICATED
// Users, devices and queued commands, plus the clock that stamps them

pub mod clock;
mod entity;

pub use clock::Timestamp;
pub use entity::{Command, Device, Entity, EntityKind, StorageKey, User};
