// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SMARTX CHAIN - NETWORK MODULE
//
// Peer Registry and the peer wire protocol: registration, heartbeat,
// handshake, and the Sync Engine's chain-length comparison and
// missing-block fetch (spec §2, §4.6, §4.7, §6).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod handshake;
pub mod protocol;
pub mod registry;
pub mod sync;
pub mod transport;

pub use handshake::{evaluate as evaluate_handshake, HandshakeOutcome};
pub use protocol::{verify_registration, Reply, Request};
pub use registry::{normalize_peer_url, PeerRecord, PeerRegistry, RegistryError};
pub use sync::{
    fetch_full_chain_if_longer, register_with_peer, sync_tick, PeerSyncOutcome, SyncError,
    DEFAULT_TICK_INTERVAL,
};
pub use transport::{PeerTransport, TcpTransport, TransportError, DEFAULT_REQUEST_TIMEOUT};
#[cfg(any(test, feature = "test-support"))]
pub use transport::MockTransport;
