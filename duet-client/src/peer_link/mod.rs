mod link_event;
mod rtc_config;
mod rtc_peer_link;

pub use link_event::*;
pub use rtc_config::RtcConfig;
pub use rtc_peer_link::{RtcPeerLink, RtcPeerLinkFactory};

use crate::error::PeerLinkError;
use crate::media::LocalStream;
use async_trait::async_trait;
use duet_core::{IceCandidate, SessionDescription};

/// One underlying peer connection.
///
/// `create_offer` and `create_answer` install the produced description as the
/// local one before returning. Remote candidates are only accepted once a
/// remote description exists; buffering before that point is the caller's job.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Binds the stream's tracks. Tracks already bound are skipped, so calling
    /// twice with the same stream is a no-op. Returns how many were added.
    async fn attach_local_tracks(&self, stream: &LocalStream) -> Result<usize, PeerLinkError>;

    async fn create_offer(&self) -> Result<SessionDescription, PeerLinkError>;

    async fn create_answer(&self) -> Result<SessionDescription, PeerLinkError>;

    async fn set_remote_description(&self, desc: SessionDescription)
    -> Result<(), PeerLinkError>;

    /// Discards a pending local offer.
    async fn rollback(&self) -> Result<(), PeerLinkError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerLinkError>;

    /// Closes the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<(), PeerLinkError>;
}

#[async_trait]
pub trait PeerLinkFactory: Send + Sync {
    /// Allocates a fresh link that reports through `events`.
    /// Fails with [`PeerLinkError::MediaPlatform`] when the platform cannot.
    async fn create(&self, events: LinkEvents) -> Result<Box<dyn PeerLink>, PeerLinkError>;
}
