//! Client side of a two-party call: negotiation state machine, peer-link
//! adapter, signaling client, roster, chat relay and capability toggles.

mod config;
mod error;
pub mod media;
pub mod peer_link;
pub mod session;
pub mod signaling;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::ClientConfig;
pub use error::{CallError, MediaError, PeerLinkError, SignalingError};
pub use session::{
    CallSession, CapabilityState, ChatEntry, ChatOutcome, Phase, Role, SessionDriver,
    SessionHandle, SessionNotice, SessionSnapshot, ToggleOutcome,
};
pub use signaling::SignalingClient;
