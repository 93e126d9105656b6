use crate::session::{Phase, Role};
use thiserror::Error;

/// Local media acquisition failures. Reported to the user; the session
/// carries on without local media.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("permission to use the media device was denied")]
    PermissionDenied,
    #[error("media device unavailable: {0}")]
    DeviceUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerLinkError {
    /// A description was applied in a signaling state that does not allow it.
    #[error("invalid signaling state: {0}")]
    InvalidSignalingState(String),
    /// The platform could not allocate a peer connection.
    #[error("media platform error: {0}")]
    MediaPlatform(String),
    #[error("peer link is closed")]
    Closed,
    #[error("peer link failure: {0}")]
    Platform(String),
}

impl From<webrtc::Error> for PeerLinkError {
    fn from(e: webrtc::Error) -> Self {
        PeerLinkError::Platform(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signal channel closed")]
    Closed,
    #[error("signal transport error: {0}")]
    Transport(String),
    #[error("signal codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    PeerLink(#[from] PeerLinkError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Signaling(#[from] SignalingError),
    #[error("`{op}` is not allowed in phase {phase:?}")]
    InvalidPhase { op: &'static str, phase: Phase },
    #[error("`{op}` requires role {expected:?}, current role is {actual:?}")]
    WrongRole {
        op: &'static str,
        expected: Role,
        actual: Role,
    },
    #[error("no remote participant in the room")]
    NoRemoteParticipant,
    #[error("no pending offer to answer")]
    NoPendingOffer,
    #[error("session is closed")]
    SessionClosed,
}

impl CallError {
    /// True for peer-connection allocation failures, which end the current
    /// call attempt and need an explicit retry.
    pub fn is_media_platform(&self) -> bool {
        matches!(self, CallError::PeerLink(PeerLinkError::MediaPlatform(_)))
    }
}
