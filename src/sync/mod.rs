// Sync module - HOW NODES CONVERGE
// Handles the gossip round, payload protocol, merge engine and scheduling

mod gossip;
mod merge;
mod peer;
mod protocol;
mod scheduler;
mod snapshot;
mod version;

pub use gossip::{GossipConfig, GossipEngine, GossipError, GossipStats, RoundOutcome};
pub use merge::{KindReport, MergeEngine, MergeError, MergeOutcome, MergeReport};
pub use peer::{PeerError, PeerSelector};
pub use protocol::{GossipPayload, ProtocolError, PROTOCOL_VERSION};
pub use scheduler::GossipScheduler;
pub use snapshot::PayloadBuilder;
pub use version::{VersionTracker, VersionVector};
