// Queue module - device command delivery on top of the replicated store

mod service;

pub use service::{CommandQueue, QueueError};
