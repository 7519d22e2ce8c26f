// Transport module - THE WIRE
// Carries gossip payloads between nodes: HTTP for real deployments,
// loopback for in-process clusters

mod traits;
mod http;
mod loopback;
mod server;

pub use traits::{
    // Core traits
    ExchangeHandler, GossipTransport,
    // Configuration
    TransportConfig,
    // Address types
    PeerAddress,
    // Errors
    TransportError,
    // Endpoints
    GOSSIP_PATH, HEALTH_PATH,
};

pub use http::HttpTransport;
pub use loopback::LoopbackTransport;
pub use server::{gossip_router, serve};
